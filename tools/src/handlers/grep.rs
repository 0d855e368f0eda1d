//! `grep(pattern, path?, glob?, limit?)` — ignore-aware regex search
//! built on the same `grep-regex`/`grep-searcher` crates ripgrep itself
//! uses, rather than a hand-rolled line scanner.

use async_trait::async_trait;
use globset::Glob;
use grep_regex::RegexMatcher;
use grep_searcher::Searcher;
use grep_searcher::sinks::UTF8;
use hive_file_ignore::FileIgnoreService;
use hive_sandbox::FileSandbox;
use serde::Deserialize;
use serde_json::json;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::error::ToolError;
use crate::registry::Tool;

const DEFAULT_LIMIT: usize = 200;

pub struct GrepTool;

#[derive(Deserialize)]
struct GrepArgs {
    pattern: String,
    path: Option<String>,
    #[serde(rename = "glob")]
    glob_filter: Option<String>,
    limit: Option<usize>,
}

#[async_trait]
impl Tool for GrepTool {
    fn info(&self) -> Info {
        Info {
            name: "grep".into(),
            description: "Search file contents in the sandbox with a regular expression.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "path": {"type": "string", "description": "Directory to search, defaults to the sandbox root"},
                    "glob": {"type": "string", "description": "Restrict to files matching this glob"},
                    "limit": {"type": "integer"}
                }
            }),
            required: vec!["pattern".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match grep(&ctx.sandbox, &call.input) {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn grep(sandbox: &FileSandbox, input: &str) -> Result<ToolResponse, ToolError> {
    let args: GrepArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    let matcher = RegexMatcher::new(&args.pattern).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    let glob_filter = args
        .glob_filter
        .as_deref()
        .map(|pattern| Glob::new(pattern).map_err(|e| ToolError::InvalidArgs(e.to_string())))
        .transpose()?
        .map(|glob| glob.compile_matcher());

    let root_rel = args.path.as_deref().unwrap_or(".");
    let abs_root = sandbox.secure_resolve(root_rel)?;
    let limit = args.limit.unwrap_or(DEFAULT_LIMIT);

    let ignore = FileIgnoreService::with_defaults();
    let walker = ignore.create_walk_builder(&abs_root).build();

    let mut matches = Vec::new();
    let mut truncated = false;

    'walk: for entry in walker {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_some_and(|ft| !ft.is_file()) {
            continue;
        }
        let path = entry.path();
        let rel = path.strip_prefix(sandbox.root()).unwrap_or(path);
        if let Some(glob) = &glob_filter {
            if !glob.is_match(rel) {
                continue;
            }
        }

        let rel_display = rel.to_string_lossy().replace('\\', "/");
        let mut file_hits = Vec::new();
        let result = Searcher::new().search_path(
            &matcher,
            path,
            UTF8(|line_number, line| {
                file_hits.push(format!("{rel_display}:{line_number}:{}", line.trim_end()));
                Ok(true)
            }),
        );
        if result.is_err() {
            continue;
        }

        for hit in file_hits {
            if matches.len() >= limit {
                truncated = true;
                break 'walk;
            }
            matches.push(hit);
        }
    }

    let mut content = matches.join("\n");
    if truncated {
        content.push_str("\n[results truncated]");
    }

    Ok(ToolResponse::ok_with_metadata(content, json!({"count": matches.len(), "truncated": truncated})))
}
