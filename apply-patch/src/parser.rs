//! Parser for the `*** Begin Patch` / `*** End Patch` envelope: per-file
//! `Add File`/`Update File`/`Delete File` directives, `@@`-delimited
//! hunks with ` `/`-`/`+` prefixed lines, and `*** Move to:` renames.

use std::path::Path;
use std::path::PathBuf;

const BEGIN_MARKER: &str = "*** Begin Patch";
const END_MARKER: &str = "*** End Patch";
const ADD_PREFIX: &str = "*** Add File: ";
const DELETE_PREFIX: &str = "*** Delete File: ";
const UPDATE_PREFIX: &str = "*** Update File: ";
const MOVE_PREFIX: &str = "*** Move to: ";
const EOF_MARKER: &str = "*** End of File";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("invalid hunk on line {line_number}: {message}")]
    InvalidHunk { message: String, line_number: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkLine {
    Context(String),
    Remove(String),
    Add(String),
}

impl ChunkLine {
    fn text(&self) -> &str {
        match self {
            ChunkLine::Context(s) | ChunkLine::Remove(s) | ChunkLine::Add(s) => s,
        }
    }
}

/// One `@@`-delimited hunk within an `Update File` directive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateFileChunk {
    pub change_context: Option<String>,
    pub lines: Vec<ChunkLine>,
    /// Set when the chunk is anchored by a trailing `*** End of File`
    /// marker, meaning it must match at the file's tail.
    pub is_end_of_file: bool,
}

impl UpdateFileChunk {
    /// The region of the original file this chunk replaces: context
    /// lines plus removed lines, in order.
    pub fn old_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| !matches!(l, ChunkLine::Add(_)))
            .map(|l| l.text().to_string())
            .collect()
    }

    /// The region of the resulting file: context lines plus added
    /// lines, in order.
    pub fn new_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| !matches!(l, ChunkLine::Remove(_)))
            .map(|l| l.text().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hunk {
    AddFile { path: PathBuf, contents: String },
    DeleteFile { path: PathBuf },
    UpdateFile {
        path: PathBuf,
        move_path: Option<PathBuf>,
        chunks: Vec<UpdateFileChunk>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPatch {
    pub hunks: Vec<Hunk>,
}

pub fn parse_patch(patch: &str) -> Result<ParsedPatch, ParseError> {
    let lines: Vec<&str> = patch.lines().collect();
    if lines.first().map(|l| l.trim_end()) != Some(BEGIN_MARKER) {
        return Err(ParseError::InvalidPatch(format!("patch must start with '{BEGIN_MARKER}'")));
    }
    let end_idx = lines
        .iter()
        .rposition(|l| l.trim_end() == END_MARKER)
        .ok_or_else(|| ParseError::InvalidPatch(format!("patch must end with '{END_MARKER}'")))?;

    let mut hunks = Vec::new();
    let mut i = 1;
    while i < end_idx {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        if let Some(path) = line.strip_prefix(ADD_PREFIX) {
            let path = PathBuf::from(path.trim());
            i += 1;
            let mut body_lines = Vec::new();
            while i < end_idx && !lines[i].starts_with("*** ") {
                body_lines.push(lines[i].strip_prefix('+').unwrap_or(lines[i]).to_string());
                i += 1;
            }
            let mut contents = body_lines.join("\n");
            if !contents.is_empty() {
                contents.push('\n');
            }
            hunks.push(Hunk::AddFile { path, contents });
        } else if let Some(path) = line.strip_prefix(DELETE_PREFIX) {
            hunks.push(Hunk::DeleteFile {
                path: PathBuf::from(path.trim()),
            });
            i += 1;
        } else if let Some(path) = line.strip_prefix(UPDATE_PREFIX) {
            let path = PathBuf::from(path.trim());
            i += 1;
            let mut move_path = None;
            if i < end_idx {
                if let Some(dest) = lines[i].strip_prefix(MOVE_PREFIX) {
                    move_path = Some(PathBuf::from(dest.trim()));
                    i += 1;
                }
            }
            let mut chunks = Vec::new();
            while i < end_idx && !lines[i].starts_with("*** ") {
                if !lines[i].starts_with("@@") {
                    return Err(ParseError::InvalidHunk {
                        message: format!("expected '@@' hunk header, found {:?}", lines[i]),
                        line_number: i + 1,
                    });
                }
                let header = lines[i].trim_start_matches("@@").trim();
                let change_context = if header.is_empty() { None } else { Some(header.to_string()) };
                i += 1;

                let mut chunk_lines = Vec::new();
                let mut is_end_of_file = false;
                while i < end_idx && !lines[i].starts_with("@@") && !lines[i].starts_with("*** ") {
                    let raw = lines[i];
                    if raw == EOF_MARKER {
                        is_end_of_file = true;
                        i += 1;
                        continue;
                    }
                    let (marker, rest) = raw.split_at(raw.len().min(1));
                    match marker {
                        "+" => chunk_lines.push(ChunkLine::Add(rest.to_string())),
                        "-" => chunk_lines.push(ChunkLine::Remove(rest.to_string())),
                        " " => chunk_lines.push(ChunkLine::Context(rest.to_string())),
                        "" => chunk_lines.push(ChunkLine::Context(String::new())),
                        _ => {
                            return Err(ParseError::InvalidHunk {
                                message: format!("unexpected hunk line: {raw:?}"),
                                line_number: i + 1,
                            });
                        }
                    }
                    i += 1;
                }
                chunks.push(UpdateFileChunk {
                    change_context,
                    lines: chunk_lines,
                    is_end_of_file,
                });
            }
            hunks.push(Hunk::UpdateFile { path, move_path, chunks });
        } else {
            return Err(ParseError::InvalidPatch(format!("unexpected line: {line:?}")));
        }
    }

    if hunks.is_empty() {
        return Err(ParseError::InvalidPatch("patch contains no file directives".to_string()));
    }

    Ok(ParsedPatch { hunks })
}

/// Re-emit a parsed patch as envelope text. Used to check the round-trip
/// invariant: parsing the result again yields an equivalent hunk set.
pub fn render_patch(patch: &ParsedPatch) -> String {
    let mut out = String::from(BEGIN_MARKER);
    out.push('\n');
    for hunk in &patch.hunks {
        match hunk {
            Hunk::AddFile { path, contents } => {
                out.push_str(ADD_PREFIX);
                push_path(&mut out, path);
                out.push('\n');
                for line in contents.strip_suffix('\n').unwrap_or(contents).split('\n') {
                    if contents.is_empty() {
                        break;
                    }
                    out.push('+');
                    out.push_str(line);
                    out.push('\n');
                }
            }
            Hunk::DeleteFile { path } => {
                out.push_str(DELETE_PREFIX);
                push_path(&mut out, path);
                out.push('\n');
            }
            Hunk::UpdateFile { path, move_path, chunks } => {
                out.push_str(UPDATE_PREFIX);
                push_path(&mut out, path);
                out.push('\n');
                if let Some(dest) = move_path {
                    out.push_str(MOVE_PREFIX);
                    push_path(&mut out, dest);
                    out.push('\n');
                }
                for chunk in chunks {
                    out.push_str("@@");
                    if let Some(ctx) = &chunk.change_context {
                        out.push(' ');
                        out.push_str(ctx);
                    }
                    out.push('\n');
                    for line in &chunk.lines {
                        match line {
                            ChunkLine::Context(s) => {
                                out.push(' ');
                                out.push_str(s);
                            }
                            ChunkLine::Remove(s) => {
                                out.push('-');
                                out.push_str(s);
                            }
                            ChunkLine::Add(s) => {
                                out.push('+');
                                out.push_str(s);
                            }
                        }
                        out.push('\n');
                    }
                    if chunk.is_end_of_file {
                        out.push_str(EOF_MARKER);
                        out.push('\n');
                    }
                }
            }
        }
    }
    out.push_str(END_MARKER);
    out
}

fn push_path(out: &mut String, path: &Path) {
    out.push_str(&path.to_string_lossy());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_file() {
        let patch = "*** Begin Patch\n*** Add File: hello.txt\n+hi\n+there\n*** End Patch";
        let parsed = parse_patch(patch).expect("parses");
        assert_eq!(parsed.hunks.len(), 1);
        match &parsed.hunks[0] {
            Hunk::AddFile { path, contents } => {
                assert_eq!(path, Path::new("hello.txt"));
                assert_eq!(contents, "hi\nthere\n");
            }
            other => panic!("unexpected hunk {other:?}"),
        }
    }

    #[test]
    fn parses_delete_file() {
        let patch = "*** Begin Patch\n*** Delete File: old.txt\n*** End Patch";
        let parsed = parse_patch(patch).expect("parses");
        assert_eq!(parsed.hunks, vec![Hunk::DeleteFile { path: PathBuf::from("old.txt") }]);
    }

    #[test]
    fn parses_update_file_with_context_and_move() {
        let patch = "*** Begin Patch\n\
*** Update File: a.rs\n\
*** Move to: b.rs\n\
@@ fn main() {\n\
 let x = 1;\n\
-let y = 2;\n\
+let y = 3;\n\
*** End of File\n\
*** End Patch";
        let parsed = parse_patch(patch).expect("parses");
        match &parsed.hunks[0] {
            Hunk::UpdateFile { path, move_path, chunks } => {
                assert_eq!(path, Path::new("a.rs"));
                assert_eq!(move_path.as_deref(), Some(Path::new("b.rs")));
                assert_eq!(chunks.len(), 1);
                assert!(chunks[0].is_end_of_file);
                assert_eq!(chunks[0].old_lines(), vec!["let x = 1;".to_string(), "let y = 2;".to_string()]);
                assert_eq!(chunks[0].new_lines(), vec!["let x = 1;".to_string(), "let y = 3;".to_string()]);
            }
            other => panic!("unexpected hunk {other:?}"),
        }
    }

    #[test]
    fn missing_begin_marker_is_rejected() {
        let err = parse_patch("*** Add File: a\n+x\n*** End Patch").unwrap_err();
        assert!(matches!(err, ParseError::InvalidPatch(_)));
    }

    #[test]
    fn missing_end_marker_is_rejected() {
        let err = parse_patch("*** Begin Patch\n*** Add File: a\n+x").unwrap_err();
        assert!(matches!(err, ParseError::InvalidPatch(_)));
    }

    #[test]
    fn round_trip_preserves_hunks() {
        let patch = "*** Begin Patch\n*** Add File: hello.txt\n+hi\n*** End Patch";
        let parsed = parse_patch(patch).expect("parses");
        let rendered = render_patch(&parsed);
        let reparsed = parse_patch(&rendered).expect("re-parses");
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn round_trip_preserves_update_chunks_with_move() {
        let patch = "*** Begin Patch\n\
*** Update File: a.rs\n\
*** Move to: b.rs\n\
@@ fn main() {\n\
 let x = 1;\n\
-let y = 2;\n\
+let y = 3;\n\
*** End of File\n\
*** End Patch";
        let parsed = parse_patch(patch).expect("parses");
        let rendered = render_patch(&parsed);
        let reparsed = parse_patch(&rendered).expect("re-parses");
        assert_eq!(parsed, reparsed);
    }
}
