//! Path-confined file access: resolution, read/write validation, and
//! ignore-aware listing/globbing, all rooted at a single working
//! directory that nothing in this crate can escape.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;
use globset::Glob;
use globset::GlobSetBuilder;
use hive_file_ignore::FileIgnoreService;
use hive_file_ignore::IgnoreConfig;

use crate::error::SandboxError;
use crate::operation::Operation;

/// Reads beyond this many bytes fail with [`SandboxError::TooLarge`].
pub const MAX_READ_BYTES: u64 = 1024 * 1024;
/// Lines longer than this are truncated with an ellipsis marker.
pub const MAX_LINE_CHARS: usize = 2000;
const SNIFF_BYTES: usize = 512;

pub struct FileSandbox {
    root: PathBuf,
    ignore: FileIgnoreService,
    last_read_times: DashMap<PathBuf, DateTime<Utc>>,
}

/// Result of resolving and stat-ing a path for a particular operation.
#[derive(Debug, Clone)]
pub struct ValidatedPath {
    pub abs_path: PathBuf,
    pub exists: bool,
    pub is_directory: bool,
    pub mod_time: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl FileSandbox {
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = dunce::canonicalize(root.as_ref())?;
        Ok(Self {
            root,
            ignore: FileIgnoreService::with_defaults(),
            last_read_times: DashMap::new(),
        })
    }

    pub fn with_ignore_config(root: impl AsRef<Path>, config: IgnoreConfig) -> std::io::Result<Self> {
        let root = dunce::canonicalize(root.as_ref())?;
        Ok(Self {
            root,
            ignore: FileIgnoreService::new(config),
            last_read_times: DashMap::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `path` onto the sandbox root without validating that the
    /// result stays inside it. Callers that need the traversal guarantee
    /// must use [`Self::secure_resolve`] instead.
    pub fn resolve(&self, path: &str) -> PathBuf {
        clean_join(&self.root, path)
    }

    /// Join `path` onto the sandbox root, lexically collapsing `..`/`.`
    /// components, and reject any result that is not prefixed by the
    /// canonical root. Never both succeeds and returns an escaped path.
    pub fn secure_resolve(&self, path: &str) -> Result<PathBuf, SandboxError> {
        let candidate = clean_join(&self.root, path);
        if candidate.starts_with(&self.root) {
            Ok(candidate)
        } else {
            Err(SandboxError::PathTraversal)
        }
    }

    pub fn in_root(&self, abs: &Path) -> bool {
        abs.starts_with(&self.root)
    }

    /// Resolve `path`, stat it, and check the invariants required for
    /// `op`: traversal guard, existence where required, and
    /// read-before-write staleness.
    pub fn validate_for(
        &self,
        op: Operation,
        path: &str,
        last_read_time: Option<DateTime<Utc>>,
    ) -> Result<ValidatedPath, SandboxError> {
        let abs = self.secure_resolve(path)?;
        let metadata = std::fs::symlink_metadata(&abs).ok();
        let exists = metadata.is_some();
        let is_directory = metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false);
        let mod_time = metadata
            .as_ref()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);
        let size = metadata.as_ref().map(|m| m.len());

        match op {
            Operation::Read | Operation::Delete => {
                if !exists {
                    return Err(SandboxError::NotFound(abs.display().to_string()));
                }
            }
            Operation::Create => {
                // Creation targets a path that must not already exist as a file;
                // directories are created implicitly by callers as needed.
            }
            Operation::Write | Operation::Edit => {
                if exists {
                    let last_read = last_read_time.or_else(|| self.last_read_times.get(&abs).map(|r| *r));
                    let stale = match (last_read, mod_time) {
                        (Some(read_at), Some(modified_at)) => read_at < modified_at,
                        (None, _) => true,
                        _ => false,
                    };
                    if stale {
                        return Err(SandboxError::StaleRead);
                    }
                }
            }
        }

        Ok(ValidatedPath {
            abs_path: abs,
            exists,
            is_directory,
            mod_time,
            size,
        })
    }

    /// Record that `abs` was read at `when`, satisfying the
    /// read-before-write requirement for a subsequent write/edit.
    pub fn record_read(&self, abs: &Path, when: DateTime<Utc>) {
        self.last_read_times.insert(abs.to_path_buf(), when);
    }

    pub fn last_read_time(&self, abs: &Path) -> Option<DateTime<Utc>> {
        self.last_read_times.get(abs).map(|r| *r)
    }

    /// Read a file's full contents as text, enforcing the size cap and
    /// binary rejection, and record the read for staleness tracking.
    pub fn safe_read(&self, path: &str, now: DateTime<Utc>) -> Result<String, SandboxError> {
        let abs = self.secure_resolve(path)?;
        let metadata = std::fs::metadata(&abs).map_err(|_| SandboxError::NotFound(abs.display().to_string()))?;
        if metadata.len() > MAX_READ_BYTES {
            return Err(SandboxError::TooLarge(MAX_READ_BYTES));
        }
        let bytes = std::fs::read(&abs)?;
        if is_binary(&abs, &bytes) {
            return Err(SandboxError::BinaryFile);
        }
        let text = decode_text(&bytes);
        self.record_read(&abs, now);
        Ok(text)
    }

    /// Read a slice of lines `[offset, offset+limit)`, truncating any
    /// individual line over [`MAX_LINE_CHARS`]. Returns the slice plus
    /// the total line count of the file.
    pub fn read_with_limit(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<(Vec<String>, usize), SandboxError> {
        let text = self.safe_read(path, now)?;
        let lines: Vec<&str> = text.lines().collect();
        let total = lines.len();
        let slice = lines
            .iter()
            .skip(offset)
            .take(limit)
            .map(|line| truncate_line(line))
            .collect();
        Ok((slice, total))
    }

    /// List entries under `path`, applying built-in ignores plus the
    /// caller's extra doublestar globs. Returns `(entries, truncated)`.
    pub fn list(&self, path: &str, ignore_globs: &[String], limit: usize) -> Result<(Vec<String>, bool), SandboxError> {
        let abs = self.secure_resolve(path)?;
        if !abs.exists() {
            return Err(SandboxError::NotFound(abs.display().to_string()));
        }
        let matcher = self
            .ignore
            .build_exclude_matcher(ignore_globs)
            .map_err(|_| SandboxError::PathTraversal)?;

        let mut entries = Vec::new();
        let mut truncated = false;
        let walker = self.ignore.create_walk_builder(&abs).build();
        for entry in walker {
            let Ok(entry) = entry else { continue };
            let rel = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if matcher.is_match(&rel_str) {
                continue;
            }
            if entries.len() >= limit {
                truncated = true;
                break;
            }
            entries.push(rel_str);
        }
        Ok((entries, truncated))
    }

    /// Match `pattern` against the sandbox root, returning `(paths, truncated)`.
    pub fn glob(&self, pattern: &str, limit: usize) -> Result<(Vec<String>, bool), SandboxError> {
        let glob = Glob::new(pattern).map_err(|_| SandboxError::PathTraversal)?;
        let mut builder = GlobSetBuilder::new();
        builder.add(glob);
        let set = builder.build().map_err(|_| SandboxError::PathTraversal)?;

        let mut matches = Vec::new();
        let mut truncated = false;
        let walker = self.ignore.create_walk_builder(&self.root).build();
        for entry in walker {
            let Ok(entry) = entry else { continue };
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                continue;
            }
            let rel = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let rel_str = rel.to_string_lossy().replace('\\', "/");
            if set.is_match(&rel_str) {
                if matches.len() >= limit {
                    truncated = true;
                    break;
                }
                matches.push(rel_str);
            }
        }
        Ok((matches, truncated))
    }
}

fn clean_join(root: &Path, rel: &str) -> PathBuf {
    let mut result = root.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            Component::Normal(seg) => result.push(seg),
            Component::RootDir | Component::Prefix(_) => {}
        }
    }
    result
}

/// Classify by extension first: anything `mime_guess` resolves to a
/// `text/*` type is text outright, and anything it resolves to a
/// concrete non-text type (`image/png`, `application/pdf`, ...) is
/// binary outright. An unresolved extension falls back to
/// `application/octet-stream`, which isn't itself a binary verdict —
/// sniff the first [`SNIFF_BYTES`] for a NUL byte in that case, the
/// same heuristic `git`/`ripgrep` use to distinguish binary content
/// from text.
fn is_binary(path: &Path, bytes: &[u8]) -> bool {
    let guess = mime_guess::from_path(path).first();
    match guess {
        Some(mime) if mime.type_() == mime_guess::mime::TEXT => false,
        Some(_) => true,
        None => bytes.iter().take(SNIFF_BYTES).any(|&b| b == 0),
    }
}

/// Decode a file accepted by [`is_binary`] as text. UTF-8 is the common
/// case and is taken directly; anything else is run through `chardetng`
/// to guess its encoding and `encoding_rs` to decode it, rather than
/// lossily replacing every non-UTF-8 byte with `U+FFFD`.
fn decode_text(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn truncate_line(line: &str) -> String {
    if line.chars().count() > MAX_LINE_CHARS {
        let truncated: String = line.chars().take(MAX_LINE_CHARS).collect();
        format!("{truncated}…")
    } else {
        line.to_string()
    }
}
