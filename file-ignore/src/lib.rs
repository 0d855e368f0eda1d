//! Ignore-pattern and directory-walk service shared by the file sandbox
//! and the `glob`/`grep`/`ls` tools, so every consumer sees identical
//! exclusions.

mod patterns;
mod service;

pub use patterns::DEFAULT_IGNORE_DIRECTORIES;
pub use patterns::DEFAULT_IGNORE_EXTENSIONS;
pub use patterns::default_directory_globs;
pub use patterns::default_extension_globs;
pub use patterns::get_all_default_excludes;
pub use service::FileIgnoreService;
pub use service::IgnoreConfig;
