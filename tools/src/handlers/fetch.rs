//! `fetch(url, format?, timeout?)` — http(s)-only retrieval, HTML
//! normalized to text via `html2text`, grounded on the teacher's
//! web-fetch handler (URL validation + content-type sniffing +
//! truncation marker).

use std::time::Duration;

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;

use crate::context::Info;
use crate::context::ToolCall;
use crate::context::ToolContext;
use crate::context::ToolResponse;
use crate::error::ToolError;
use crate::registry::Tool;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_CONTENT_CHARS: usize = 200_000;

static SCRIPT_OR_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</\1\s*>").expect("hardcoded pattern is valid"));

pub struct FetchTool;

#[derive(Deserialize)]
struct FetchArgs {
    url: String,
    format: Option<String>,
    timeout: Option<u64>,
}

#[async_trait]
impl Tool for FetchTool {
    fn info(&self) -> Info {
        Info {
            name: "fetch".into(),
            description: "Fetch an http(s) URL and return its content as text, markdown, or raw html.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string"},
                    "format": {"type": "string", "enum": ["text", "markdown", "html"]},
                    "timeout": {"type": "integer"}
                }
            }),
            required: vec!["url".into()],
        }
    }

    async fn run(&self, ctx: &ToolContext, call: &ToolCall) -> ToolResponse {
        match fetch(&ctx.http, &call.input).await {
            Ok(response) => response,
            Err(err) => ToolResponse::error(err.to_string()),
        }
    }
}

fn strip_scripts(html: &str) -> String {
    SCRIPT_OR_STYLE.replace_all(html, "").into_owned()
}

async fn fetch(http: &reqwest::Client, input: &str) -> Result<ToolResponse, ToolError> {
    let args: FetchArgs = serde_json::from_str(input).map_err(|e| ToolError::InvalidArgs(e.to_string()))?;
    if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
        return Err(ToolError::InvalidArgs("only http:// and https:// urls are supported".into()));
    }

    let timeout = Duration::from_secs(args.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let response = http.get(&args.url).timeout(timeout).send().await?;
    if !response.status().is_success() {
        return Err(ToolError::Other(format!(
            "http error {}: {}",
            response.status().as_u16(),
            response.status().canonical_reason().unwrap_or("unknown")
        )));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = response.text().await?;
    let is_html = content_type.contains("text/html");

    let format = args.format.as_deref().unwrap_or("text");
    let rendered = match (format, is_html) {
        ("html", _) => strip_scripts(&body),
        (_, true) => html2text::from_read(strip_scripts(&body).as_bytes(), usize::MAX),
        (_, false) => body,
    };

    let truncated = if rendered.chars().count() > MAX_CONTENT_CHARS {
        let kept: String = rendered.chars().take(MAX_CONTENT_CHARS).collect();
        format!("{kept}\n\n[content truncated at {MAX_CONTENT_CHARS} characters]")
    } else {
        rendered
    };

    Ok(ToolResponse::ok_with_metadata(truncated, json!({"url": args.url, "content_type": content_type})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_and_style_tags() {
        let html = "<html><head><style>a{}</style></head><body><script>alert(1)</script><p>hi</p></body></html>";
        let stripped = strip_scripts(html);
        assert!(!stripped.contains("alert"));
        assert!(!stripped.contains("style"));
        assert!(stripped.contains("<p>hi</p>"));
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let http = reqwest::Client::new();
        let err = fetch(&http, r#"{"url":"file:///etc/passwd"}"#).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArgs(_)));
    }
}
