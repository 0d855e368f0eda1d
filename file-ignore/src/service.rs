//! Shared service for building directory walkers and glob matchers with
//! consistent ignore behavior across the sandbox and the tool runtime.

use std::path::Path;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;

use crate::patterns::get_all_default_excludes;

/// Configuration for ignore behavior.
#[derive(Debug, Clone)]
pub struct IgnoreConfig {
    /// Whether to respect `.gitignore` files (default: true).
    pub respect_gitignore: bool,
    /// Whether to include hidden (dotfile) entries (default: false).
    pub include_hidden: bool,
    /// Whether to follow symbolic links (default: false).
    pub follow_links: bool,
    /// Additional user-supplied doublestar exclude patterns.
    pub custom_excludes: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            follow_links: false,
            custom_excludes: Vec::new(),
        }
    }
}

/// Shared service for handling ignore patterns.
///
/// Used by the file sandbox's `list`/`glob` operations and by the
/// `glob`/`grep`/`ls` tools so every walk sees the same exclusions.
#[derive(Debug)]
pub struct FileIgnoreService {
    config: IgnoreConfig,
}

impl FileIgnoreService {
    pub fn new(config: IgnoreConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(IgnoreConfig::default())
    }

    /// Create a `WalkBuilder` with all ignore rules applied: built-in
    /// directory/extension excludes, optional `.gitignore`, hidden-file
    /// and symlink policy, and any custom excludes.
    pub fn create_walk_builder(&self, root: &Path) -> WalkBuilder {
        let mut builder = WalkBuilder::new(root);

        if self.config.respect_gitignore {
            builder.git_ignore(true).git_global(true).git_exclude(true);
        } else {
            builder.git_ignore(false).git_global(false).git_exclude(false);
        }

        builder
            .hidden(!self.config.include_hidden)
            .follow_links(self.config.follow_links)
            .require_git(false);

        if let Ok(overrides) = self.build_overrides(root) {
            builder.overrides(overrides);
        }

        builder
    }

    fn build_overrides(&self, root: &Path) -> Result<ignore::overrides::Override, ignore::Error> {
        let mut override_builder = OverrideBuilder::new(root);
        for pattern in get_all_default_excludes().iter().chain(self.config.custom_excludes.iter()) {
            override_builder.add(&format!("!{pattern}"))?;
        }
        override_builder.build()
    }

    /// Build a standalone `GlobSet` matcher from the built-in excludes
    /// plus any extra user patterns, for callers that want to test a
    /// single path without walking a directory tree.
    pub fn build_exclude_matcher(&self, extra: &[String]) -> Result<GlobSet, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in get_all_default_excludes().iter().chain(self.config.custom_excludes.iter()).chain(extra.iter()) {
            builder.add(Glob::new(pattern)?);
        }
        builder.build()
    }

    pub fn config(&self) -> &IgnoreConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_respects_gitignore_and_hides_dotfiles() {
        let config = IgnoreConfig::default();
        assert!(config.respect_gitignore);
        assert!(!config.include_hidden);
        assert!(!config.follow_links);
    }

    #[test]
    fn create_walk_builder_does_not_panic() {
        let temp = tempdir().expect("create temp dir");
        let service = FileIgnoreService::with_defaults();
        let _builder = service.create_walk_builder(temp.path());
    }

    #[test]
    fn exclude_matcher_matches_builtin_and_custom_patterns() {
        let service = FileIgnoreService::new(IgnoreConfig {
            custom_excludes: vec!["**/*.secret".to_string()],
            ..Default::default()
        });
        let matcher = service.build_exclude_matcher(&[]).expect("builds");
        assert!(matcher.is_match("src/node_modules/pkg/index.js"));
        assert!(matcher.is_match("target/debug/build.rs"));
        assert!(matcher.is_match("config/creds.secret"));
        assert!(!matcher.is_match("src/main.rs"));
    }
}
