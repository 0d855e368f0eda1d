//! Default ignore patterns shared by the sandbox's walk/list/glob
//! operations and the tool runtime's `glob`/`grep`/`ls` tools.

/// Directory names skipped outright regardless of `.gitignore` content.
pub const DEFAULT_IGNORE_DIRECTORIES: &[&str] = &[
    ".git",
    "node_modules",
    "vendor",
    "dist",
    "build",
    "target",
    "__pycache__",
];

/// File extensions (without the leading dot) treated as non-text and
/// skipped by directory walks / rejected by the sandbox's read path.
pub const DEFAULT_IGNORE_EXTENSIONS: &[&str] = &["exe", "dll", "so", "pyc", "lock"];

/// Doublestar glob patterns derived from [`DEFAULT_IGNORE_DIRECTORIES`],
/// suitable for feeding to a `globset::GlobSet` builder.
pub fn default_directory_globs() -> Vec<String> {
    DEFAULT_IGNORE_DIRECTORIES
        .iter()
        .map(|dir| format!("**/{dir}/**"))
        .collect()
}

/// Doublestar glob patterns derived from [`DEFAULT_IGNORE_EXTENSIONS`].
pub fn default_extension_globs() -> Vec<String> {
    DEFAULT_IGNORE_EXTENSIONS.iter().map(|ext| format!("**/*.{ext}")).collect()
}

/// All built-in exclude patterns (directories + extensions) combined,
/// before any user-supplied globs are layered on.
pub fn get_all_default_excludes() -> Vec<String> {
    let mut patterns = default_directory_globs();
    patterns.extend(default_extension_globs());
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directory_globs_cover_git_and_node_modules() {
        let globs = default_directory_globs();
        assert!(globs.contains(&"**/.git/**".to_string()));
        assert!(globs.contains(&"**/node_modules/**".to_string()));
    }

    #[test]
    fn get_all_default_excludes_is_nonempty_and_combined() {
        let all = get_all_default_excludes();
        assert!(all.len() > DEFAULT_IGNORE_DIRECTORIES.len());
        assert!(all.contains(&"**/*.lock".to_string()));
    }
}
