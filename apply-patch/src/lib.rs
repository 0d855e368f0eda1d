//! Apply a `*** Begin Patch` envelope to the filesystem: add/update/delete
//! files, resolving `Update File` context lines against the file's
//! current content before editing it. Applied atomically across files —
//! on any failure nothing already written is rolled back further than
//! the single offending file, and the caller is expected to have taken
//! a snapshot if whole-patch atomicity is required (the tool runtime
//! does this for `multi_edit`; this crate focuses on correct resolution).

mod parser;
mod seek_sequence;

use std::path::Path;
use std::path::PathBuf;

pub use parser::ChunkLine;
pub use parser::Hunk;
pub use parser::ParseError;
pub use parser::ParsedPatch;
pub use parser::UpdateFileChunk;
pub use parser::parse_patch;
pub use parser::render_patch;

#[derive(Debug, thiserror::Error)]
pub enum ApplyPatchError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{context}: {source}")]
    Io { context: String, source: std::io::Error },
    #[error("failed to find expected lines in {path}:\n{snippet}")]
    ContextNotFound { path: PathBuf, snippet: String },
}

#[derive(Debug, Default, Clone)]
pub struct AffectedPaths {
    pub added: Vec<PathBuf>,
    pub modified: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
}

fn io_err(context: impl Into<String>, source: std::io::Error) -> ApplyPatchError {
    ApplyPatchError::Io {
        context: context.into(),
        source,
    }
}

/// Parse `patch` and apply it against the filesystem rooted at `cwd`,
/// returning which paths were added/modified/deleted.
pub fn apply_patch(patch: &str, cwd: &Path) -> Result<AffectedPaths, ApplyPatchError> {
    let parsed = parse_patch(patch)?;
    apply_hunks(&parsed.hunks, cwd)
}

pub fn apply_hunks(hunks: &[Hunk], cwd: &Path) -> Result<AffectedPaths, ApplyPatchError> {
    let mut affected = AffectedPaths::default();
    for hunk in hunks {
        match hunk {
            Hunk::AddFile { path, contents } => {
                let abs = cwd.join(path);
                if let Some(parent) = abs.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| io_err(format!("create parent dirs for {}", abs.display()), e))?;
                    }
                }
                std::fs::write(&abs, contents).map_err(|e| io_err(format!("write {}", abs.display()), e))?;
                affected.added.push(abs);
            }
            Hunk::DeleteFile { path } => {
                let abs = cwd.join(path);
                std::fs::remove_file(&abs).map_err(|e| io_err(format!("delete {}", abs.display()), e))?;
                affected.deleted.push(abs);
            }
            Hunk::UpdateFile { path, move_path, chunks } => {
                let abs = cwd.join(path);
                let new_contents = derive_new_contents(&abs, chunks)?;
                if let Some(dest) = move_path {
                    let dest_abs = cwd.join(dest);
                    if let Some(parent) = dest_abs.parent() {
                        if !parent.as_os_str().is_empty() {
                            std::fs::create_dir_all(parent)
                                .map_err(|e| io_err(format!("create parent dirs for {}", dest_abs.display()), e))?;
                        }
                    }
                    std::fs::write(&dest_abs, &new_contents).map_err(|e| io_err(format!("write {}", dest_abs.display()), e))?;
                    std::fs::remove_file(&abs).map_err(|e| io_err(format!("remove original {}", abs.display()), e))?;
                    affected.modified.push(dest_abs);
                } else {
                    std::fs::write(&abs, &new_contents).map_err(|e| io_err(format!("write {}", abs.display()), e))?;
                    affected.modified.push(abs);
                }
            }
        }
    }
    Ok(affected)
}

/// Compute the full new content of `path` after applying `chunks`,
/// without writing anything. Used both by `apply_hunks` and by callers
/// that want a diff preview before committing to disk.
pub fn derive_new_contents(path: &Path, chunks: &[UpdateFileChunk]) -> Result<String, ApplyPatchError> {
    let original = std::fs::read_to_string(path).map_err(|e| io_err(format!("read {}", path.display()), e))?;
    let mut original_lines: Vec<String> = original.split('\n').map(String::from).collect();
    if original_lines.last().is_some_and(String::is_empty) {
        original_lines.pop();
    }

    let replacements = compute_replacements(&original_lines, path, chunks)?;
    let mut new_lines = apply_replacements(original_lines, &replacements);
    if !new_lines.last().is_some_and(String::is_empty) {
        new_lines.push(String::new());
    }
    Ok(new_lines.join("\n"))
}

fn compute_replacements(
    original_lines: &[String],
    path: &Path,
    chunks: &[UpdateFileChunk],
) -> Result<Vec<(usize, usize, Vec<String>)>, ApplyPatchError> {
    let mut replacements = Vec::new();
    let mut line_index = 0usize;

    for chunk in chunks {
        if let Some(ctx_line) = &chunk.change_context {
            if let Some(idx) = seek_sequence::seek_sequence(original_lines, std::slice::from_ref(ctx_line), line_index, false) {
                line_index = idx + 1;
            } else {
                return Err(ApplyPatchError::ContextNotFound {
                    path: path.to_path_buf(),
                    snippet: ctx_line.clone(),
                });
            }
        }

        let old_lines = chunk.old_lines();
        let new_lines = chunk.new_lines();

        if old_lines.is_empty() {
            let insertion_idx = if original_lines.last().is_some_and(String::is_empty) {
                original_lines.len().saturating_sub(1)
            } else {
                original_lines.len()
            };
            replacements.push((insertion_idx, 0, new_lines));
            continue;
        }

        let mut pattern: &[String] = &old_lines;
        let mut found = seek_sequence::seek_sequence(original_lines, pattern, line_index, chunk.is_end_of_file);
        let mut replacement: Vec<String> = new_lines.clone();

        if found.is_none() && pattern.last().is_some_and(String::is_empty) {
            pattern = &pattern[..pattern.len() - 1];
            if replacement.last().is_some_and(String::is_empty) {
                replacement.pop();
            }
            found = seek_sequence::seek_sequence(original_lines, pattern, line_index, chunk.is_end_of_file);
        }

        match found {
            Some(start_idx) => {
                replacements.push((start_idx, pattern.len(), replacement));
                line_index = start_idx + pattern.len();
            }
            None => {
                return Err(ApplyPatchError::ContextNotFound {
                    path: path.to_path_buf(),
                    snippet: old_lines.join("\n"),
                });
            }
        }
    }

    replacements.sort_by_key(|(idx, ..)| *idx);
    Ok(replacements)
}

fn apply_replacements(mut lines: Vec<String>, replacements: &[(usize, usize, Vec<String>)]) -> Vec<String> {
    for (start_idx, old_len, new_segment) in replacements.iter().rev() {
        let start_idx = *start_idx;
        for _ in 0..*old_len {
            if start_idx < lines.len() {
                lines.remove(start_idx);
            }
        }
        for (offset, line) in new_segment.iter().enumerate() {
            lines.insert(start_idx + offset, line.clone());
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_file_writes_contents() {
        let dir = tempdir().expect("tempdir");
        let patch = "*** Begin Patch\n*** Add File: hello.txt\n+hi there\n*** End Patch";
        let affected = apply_patch(patch, dir.path()).expect("applies");
        assert_eq!(affected.added.len(), 1);
        let contents = std::fs::read_to_string(dir.path().join("hello.txt")).expect("read");
        assert_eq!(contents, "hi there\n");
    }

    #[test]
    fn delete_file_removes_it() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("old.txt"), "bye").expect("write");
        let patch = "*** Begin Patch\n*** Delete File: old.txt\n*** End Patch";
        let affected = apply_patch(patch, dir.path()).expect("applies");
        assert_eq!(affected.deleted.len(), 1);
        assert!(!dir.path().join("old.txt").exists());
    }

    #[test]
    fn update_file_replaces_matched_region() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "aaa bbb ccc\n").expect("write");
        let patch = "*** Begin Patch\n*** Update File: a.txt\n@@\n-aaa bbb ccc\n+xxx bbb ccc\n*** End Patch";
        apply_patch(patch, dir.path()).expect("applies");
        let contents = std::fs::read_to_string(dir.path().join("a.txt")).expect("read");
        assert_eq!(contents, "xxx bbb ccc\n");
    }

    #[test]
    fn update_file_with_unmatched_context_fails_and_leaves_file_untouched() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.txt"), "aaa bbb ccc\n").expect("write");
        let patch = "*** Begin Patch\n*** Update File: a.txt\n@@\n-nonexistent\n+xxx\n*** End Patch";
        let err = apply_patch(patch, dir.path()).unwrap_err();
        assert!(matches!(err, ApplyPatchError::ContextNotFound { .. }));
        let contents = std::fs::read_to_string(dir.path().join("a.txt")).expect("read");
        assert_eq!(contents, "aaa bbb ccc\n");
    }

    #[test]
    fn move_to_renames_file() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a.rs"), "let y = 2;\n").expect("write");
        let patch = "*** Begin Patch\n*** Update File: a.rs\n*** Move to: b.rs\n@@\n-let y = 2;\n+let y = 3;\n*** End Patch";
        let affected = apply_patch(patch, dir.path()).expect("applies");
        assert_eq!(affected.modified, vec![dir.path().join("b.rs")]);
        assert!(!dir.path().join("a.rs").exists());
        let contents = std::fs::read_to_string(dir.path().join("b.rs")).expect("read");
        assert_eq!(contents, "let y = 3;\n");
    }
}
