//! Shared result type returned across the sandbox contract boundary.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Snapshot of a path's filesystem state as observed by the sandbox,
/// independent of any particular read/write operation. `is_modified`
/// compares `mod_time` against the caller-supplied `last_read_time`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileValidationResult {
    pub abs_path: String,
    pub exists: bool,
    pub is_directory: bool,
    pub is_modified: bool,
    pub last_read_time: Option<DateTime<Utc>>,
    pub mod_time: Option<DateTime<Utc>>,
    pub size: Option<u64>,
    pub error: Option<String>,
}

impl FileValidationResult {
    pub fn missing(abs_path: impl Into<String>) -> Self {
        Self {
            abs_path: abs_path.into(),
            exists: false,
            is_directory: false,
            is_modified: false,
            last_read_time: None,
            mod_time: None,
            size: None,
            error: None,
        }
    }
}
