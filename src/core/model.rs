// logtail - core/model.rs
//
// Shared data types: file identity, file groups, records, and the cycle
// status returned to the host.

use crate::core::pattern::TailPattern;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::Path;

// =============================================================================
// FileIdentity
// =============================================================================

/// Opaque, comparable identifier for a file that is stable across renames
/// within a filesystem.
///
/// On Unix this is the inode number. On other platforms std does not expose
/// a stable file index, so the canonicalised path is hashed instead; renames
/// are then observed as a new file, which keeps delivery at-least-once.
///
/// Two paths with the same identity are the same file. Never compare files
/// by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileIdentity(u64);

impl FileIdentity {
    /// Derive the identity of a file from its metadata, as observed at open
    /// or stat time.
    #[cfg(unix)]
    pub fn from_metadata(meta: &Metadata, _path: &Path) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self(meta.ino())
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_meta: &Metadata, path: &Path) -> Self {
        use std::hash::{Hash, Hasher};
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        canonical.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Reconstruct an identity from a persisted snapshot entry.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value persisted in the position snapshot.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

// =============================================================================
// FileGroup
// =============================================================================

/// A named pairing of a compiled glob pattern with a set of static headers.
/// Lives for the process duration; group names are unique.
#[derive(Debug, Clone)]
pub struct FileGroup {
    /// Unique group name from the `filegroups` key.
    pub name: String,
    /// Compiled glob pattern for this group.
    pub pattern: TailPattern,
    /// Static headers attached to every record of every file in the group.
    pub headers: BTreeMap<String, String>,
}

// =============================================================================
// Record
// =============================================================================

/// One framed record: the literal file bytes between two frame boundaries
/// (trailing LF and a preceding CR stripped), or a merged multiline blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Raw record bytes.
    pub body: Vec<u8>,
    /// Group headers plus any per-record headers (path, byteoffset, multiline).
    pub headers: BTreeMap<String, String>,
}

impl Record {
    pub fn new(body: Vec<u8>, headers: BTreeMap<String, String>) -> Self {
        Self { body, headers }
    }

    /// The body decoded as lossy UTF-8, for logging and text sinks.
    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

// =============================================================================
// Cycle status
// =============================================================================

/// Result of one `process` cycle, reported to the host poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// Records were produced this cycle; poll again immediately.
    Ready,
    /// No records this cycle; the host should retry with backoff.
    Backoff,
}
