// logtail - core/position.rs
//
// Durable position snapshot: the {file identity -> committed offset} map,
// persisted as a JSON array and rewritten after every successful commit.
//
// Design principles:
// - The snapshot is written atomically (write temp, rename) so a crash
//   during a write never corrupts the previous good snapshot.
// - Load errors are non-fatal: a missing or malformed snapshot loads as an
//   empty map, which restarts previously tracked files from offset 0. This
//   is the documented at-least-once boundary.
// - Entries are sorted by inode, so writing the same state twice produces
//   byte-identical files.

use crate::util::error::PositionError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One persisted entry: `{"inode": ..., "pos": ..., "file": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub inode: u64,
    pub pos: u64,
    pub file: PathBuf,
}

/// Owns the on-disk snapshot file and an in-memory copy of the last
/// serialised document, used to skip no-op background writes.
pub struct PositionStore {
    path: PathBuf,
    last_written: Option<String>,
}

impl PositionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            last_written: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. Missing file: empty (normal first run). Malformed
    /// file: logged and empty — previously tracked files restart from 0.
    pub fn load(&self) -> Vec<PositionRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Cannot read position snapshot, starting empty"
                    );
                }
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<PositionRecord>>(&content) {
            Ok(records) => {
                tracing::info!(
                    path = %self.path.display(),
                    entries = records.len(),
                    "Position snapshot loaded"
                );
                records
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Position snapshot is malformed, starting empty; duplicates possible"
                );
                Vec::new()
            }
        }
    }

    /// Atomically rewrite the snapshot: serialise, write to a sibling temp
    /// file, then rename over the target.
    pub fn write(&mut self, mut records: Vec<PositionRecord>) -> Result<(), PositionError> {
        records.sort_by_key(|r| r.inode);
        let json =
            serde_json::to_string(&records).map_err(|e| PositionError::Serialize {
                path: self.path.clone(),
                source: e,
            })?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PositionError::Io {
                path: parent.to_path_buf(),
                operation: "create directory",
                source: e,
            })?;
        }

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes()).map_err(|e| PositionError::Io {
            path: tmp.clone(),
            operation: "write",
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            PositionError::Io {
                path: self.path.clone(),
                operation: "rename",
                source: e,
            }
        })?;

        tracing::debug!(
            path = %self.path.display(),
            entries = records.len(),
            "Position snapshot written"
        );
        self.last_written = Some(json);
        Ok(())
    }

    /// Write only when the state differs from the last successful write.
    /// Used by the background position-writer.
    pub fn write_if_changed(
        &mut self,
        mut records: Vec<PositionRecord>,
    ) -> Result<(), PositionError> {
        records.sort_by_key(|r| r.inode);
        let json = serde_json::to_string(&records).map_err(|e| PositionError::Serialize {
            path: self.path.clone(),
            source: e,
        })?;
        if self.last_written.as_deref() == Some(json.as_str()) {
            return Ok(());
        }
        self.write(records)
    }
}

// =============================================================================
// Tests
// =============================================================================
