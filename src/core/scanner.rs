// logtail - core/scanner.rs
//
// Pattern expansion over the filesystem with a bounded directory cache.
//
// Expansion walks the compiled pattern segment by segment, starting from the
// pattern's fixed directory prefix. Intermediate levels (directory matching,
// `**` expansion) consult a per-directory cache validated by the directory's
// mtime: an unchanged directory reuses its cached child-directory list. The
// leaf level is always freshly listed, so a file created between refreshes
// is surfaced on the very next cycle regardless of mtime granularity.
//
// Unreadable directories are logged and skipped; they yield no matches but
// never fail the refresh.

use crate::core::pattern::{Segment, TailPattern};
use crate::util::constants::MAX_DIR_CACHE_ENTRIES;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

struct CachedDir {
    mtime: SystemTime,
    subdirs: Vec<PathBuf>,
}

/// Stateful pattern scanner. Owns only its directory cache; file state
/// belongs to the registry.
pub struct Scanner {
    cache: HashMap<PathBuf, CachedDir>,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Resolve `pattern` to the current set of matching regular files, in
    /// ascending path order.
    pub fn resolve(&mut self, pattern: &TailPattern) -> Vec<PathBuf> {
        let base = pattern.base();
        if !base.is_dir() {
            tracing::debug!(base = %base.display(), "Pattern base directory absent");
            return Vec::new();
        }

        let mut dirs: Vec<PathBuf> = vec![base.to_path_buf()];
        let segments = pattern.segments();

        for (idx, segment) in segments.iter().enumerate() {
            let leaf = idx == segments.len() - 1;
            if leaf {
                let mut files = self.match_files(&dirs, segment);
                files.sort();
                files.dedup();
                return files;
            }
            dirs = self.match_dirs(&dirs, segment);
            if dirs.is_empty() {
                return Vec::new();
            }
        }

        Vec::new()
    }

    /// Drop all cached listings.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    // -------------------------------------------------------------------------
    // Intermediate levels (cached)
    // -------------------------------------------------------------------------

    fn match_dirs(&mut self, dirs: &[PathBuf], segment: &Segment) -> Vec<PathBuf> {
        let mut next = Vec::new();
        for dir in dirs {
            match segment {
                Segment::Literal(name) => {
                    let candidate = dir.join(name);
                    if candidate.is_dir() {
                        next.push(candidate);
                    }
                }
                Segment::Wildcard(_) => {
                    for sub in self.subdirs(dir) {
                        let matches = sub
                            .file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| segment.matches(n));
                        if matches {
                            next.push(sub);
                        }
                    }
                }
                Segment::Recursive => {
                    // `**` matches zero or more segments: the directory
                    // itself plus every descendant directory.
                    next.push(dir.clone());
                    self.collect_descendants(dir, &mut next);
                }
            }
        }
        next.sort();
        next.dedup();
        next
    }

    fn collect_descendants(&mut self, dir: &Path, out: &mut Vec<PathBuf>) {
        let mut stack = self.subdirs(dir);
        while let Some(d) = stack.pop() {
            stack.extend(self.subdirs(&d));
            out.push(d);
        }
    }

    /// Child directories of `dir`, from the cache when its mtime is
    /// unchanged since the last listing. Symlinked directories are not
    /// followed, so cyclic trees cannot recurse forever.
    fn subdirs(&mut self, dir: &Path) -> Vec<PathBuf> {
        let mtime = match std::fs::metadata(dir).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Cannot stat directory, skipping");
                self.cache.remove(dir);
                return Vec::new();
            }
        };

        if let Some(cached) = self.cache.get(dir) {
            if cached.mtime == mtime {
                return cached.subdirs.clone();
            }
        }

        let subdirs = list_subdirs(dir);
        if self.cache.len() >= MAX_DIR_CACHE_ENTRIES && !self.cache.contains_key(dir) {
            tracing::debug!(entries = self.cache.len(), "Directory cache full, clearing");
            self.cache.clear();
        }
        self.cache.insert(
            dir.to_path_buf(),
            CachedDir {
                mtime,
                subdirs: subdirs.clone(),
            },
        );
        subdirs
    }

    // -------------------------------------------------------------------------
    // Leaf level (always fresh)
    // -------------------------------------------------------------------------

    fn match_files(&mut self, dirs: &[PathBuf], segment: &Segment) -> Vec<PathBuf> {
        let mut files = Vec::new();
        match segment {
            Segment::Recursive => {
                // A trailing `**` matches every file under the subtree.
                let mut all_dirs: Vec<PathBuf> = dirs.to_vec();
                for dir in dirs {
                    self.collect_descendants(dir, &mut all_dirs);
                }
                all_dirs.sort();
                all_dirs.dedup();
                for dir in &all_dirs {
                    list_matching_files(dir, None, &mut files);
                }
            }
            Segment::Literal(name) => {
                for dir in dirs {
                    let candidate = dir.join(name);
                    if is_regular_file(&candidate) {
                        files.push(candidate);
                    }
                }
            }
            Segment::Wildcard(_) => {
                for dir in dirs {
                    list_matching_files(dir, Some(segment), &mut files);
                }
            }
        }
        files
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

fn list_subdirs(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot read directory, skipping");
            return Vec::new();
        }
    };
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        // file_type() does not follow symlinks; a symlink to a directory is
        // not descended into.
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            subdirs.push(entry.path());
        }
    }
    subdirs
}

fn list_matching_files(dir: &Path, segment: Option<&Segment>, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot read directory, skipping");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name_matches = match segment {
            None => true,
            Some(seg) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| seg.matches(n)),
        };
        if name_matches && is_regular_file(&path) {
            out.push(path);
        }
    }
}

/// Regular files only: directories and symlinks to directories are excluded;
/// a symlink to a regular file counts (metadata follows the link).
fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
