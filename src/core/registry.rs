// logtail - core/registry.rs
//
// The authoritative map of currently tracked files, keyed by stable file
// identity. Reconciles with the scanner's matched set each cycle: opens new
// files, follows renames without resetting offsets, detects truncation,
// retires unmatched files after the idle timeout, and bounds the number of
// simultaneously open handles.

use crate::core::model::FileIdentity;
use crate::core::multiline::MultilineSettings;
use crate::core::position::PositionRecord;
use crate::core::tail_file::TailFile;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

/// Registry behaviour knobs, fixed at configuration time.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Initialise newly discovered files at end-of-file instead of 0.
    pub skip_to_end: bool,
    /// Header key for the source path, when the path header is enabled.
    pub file_header_key: Option<String>,
    /// Files untouched this long are closed; unmatched files are removed.
    pub idle_timeout: Duration,
    /// Upper bound on simultaneously open handles.
    pub max_open_files: usize,
    /// Multiline aggregation, applied to every tracked file when set.
    pub multiline: Option<MultilineSettings>,
}

/// One path produced by the scanner, tagged with its group's headers.
#[derive(Debug, Clone)]
pub struct MatchedPath {
    pub path: PathBuf,
    pub headers: BTreeMap<String, String>,
}

pub struct Registry {
    config: RegistryConfig,
    files: HashMap<FileIdentity, TailFile>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            files: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get_mut(&mut self, identity: FileIdentity) -> Option<&mut TailFile> {
        self.files.get_mut(&identity)
    }

    /// Reconcile the registry with the matched path set. `restore` holds
    /// offsets loaded from the position snapshot, consulted once per newly
    /// tracked identity.
    pub fn reconcile(
        &mut self,
        matched: &[MatchedPath],
        restore: &HashMap<u64, u64>,
        now: DateTime<Utc>,
    ) {
        let mut seen: HashSet<FileIdentity> = HashSet::with_capacity(matched.len());

        for m in matched {
            let meta = match std::fs::metadata(&m.path) {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::warn!(
                        file = %m.path.display(),
                        error = %e,
                        "Cannot stat matched file, skipping this cycle"
                    );
                    continue;
                }
            };
            let identity = FileIdentity::from_metadata(&meta, &m.path);
            if !seen.insert(identity) {
                // Two matched paths with one identity are the same file;
                // the first (lowest path, first group) wins.
                continue;
            }

            let size = meta.len();
            let mtime = meta.modified().map(DateTime::<Utc>::from).unwrap_or(now);

            if let Some(tf) = self.files.get_mut(&identity) {
                if tf.path() != m.path {
                    tf.set_path(&m.path, self.config.file_header_key.as_deref());
                }
                if size < tf.pos() {
                    tracing::warn!(
                        file = %m.path.display(),
                        size,
                        pos = tf.pos(),
                        "File truncated below committed offset, restarting from 0"
                    );
                    if let Err(e) = tf.update_pos(&m.path, identity, 0) {
                        tracing::warn!(file = %m.path.display(), error = %e, "Truncation reset failed");
                        continue;
                    }
                    tf.observe(size, mtime, now);
                } else if size > tf.observed_size() || mtime > tf.last_updated() {
                    tf.observe(size, mtime, now);
                }
            } else {
                self.track_new(m, identity, size, mtime, restore, now);
            }
        }

        // Identities no longer matched linger until their idle timeout, then
        // the handle is closed and the entry removed. Offsets stay in the
        // snapshot only while the entry lives.
        let idle_timeout = self.config.idle_timeout;
        self.files.retain(|identity, tf| {
            if seen.contains(identity) {
                return true;
            }
            if idle_for(tf, now) >= idle_timeout {
                tracing::info!(
                    file = %tf.path().display(),
                    pos = tf.pos(),
                    "Unmatched file idle-expired, untracking"
                );
                tf.close_handle();
                false
            } else {
                true
            }
        });

        self.enforce_handle_budget();
    }

    fn track_new(
        &mut self,
        m: &MatchedPath,
        identity: FileIdentity,
        size: u64,
        mtime: DateTime<Utc>,
        restore: &HashMap<u64, u64>,
        now: DateTime<Utc>,
    ) {
        let mut headers = m.headers.clone();
        if let Some(key) = &self.config.file_header_key {
            headers.insert(key.clone(), m.path.display().to_string());
        }

        let mut tf = match TailFile::open(
            &m.path,
            headers,
            self.config.multiline.clone(),
            self.config.skip_to_end,
            now,
        ) {
            Ok(tf) => tf,
            Err(e) => {
                tracing::warn!(
                    file = %m.path.display(),
                    error = %e,
                    "Cannot open matched file, skipping this cycle"
                );
                return;
            }
        };

        // A checkpointed offset takes precedence over both 0 and skipToEnd.
        // An offset beyond the current length means the file was truncated
        // after the snapshot was written; restart from 0.
        if let Some(&pos) = restore.get(&tf.identity().as_u64()) {
            if pos <= size {
                match tf.update_pos(&m.path, tf.identity(), pos) {
                    Ok(true) => {
                        tracing::info!(
                            file = %m.path.display(),
                            pos,
                            "Resuming from checkpointed offset"
                        );
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(file = %m.path.display(), error = %e, "Checkpoint seek failed");
                        return;
                    }
                }
            } else {
                tracing::warn!(
                    file = %m.path.display(),
                    checkpoint = pos,
                    size,
                    "Checkpointed offset beyond file length, restarting from 0"
                );
            }
        }

        tf.observe(size, mtime, now);
        if tf.line_read_pos() >= size {
            tf.clear_dirty();
        }
        tracing::info!(
            file = %m.path.display(),
            pos = tf.pos(),
            size,
            "Tracking file"
        );
        self.files.insert(tf.identity(), tf);
    }

    /// Files with work to do, in consumption order: ascending last-updated
    /// timestamp (the file mtime at last observation), ties by identity.
    /// Clean files with a pending multiline event are included so the
    /// stall timeout can fire.
    pub fn consume_order(&self) -> Vec<FileIdentity> {
        let mut dirty: Vec<(DateTime<Utc>, FileIdentity)> = self
            .files
            .values()
            .filter(|tf| tf.is_dirty() || tf.has_pending_event())
            .map(|tf| (tf.last_updated(), tf.identity()))
            .collect();
        dirty.sort();
        dirty.into_iter().map(|(_, id)| id).collect()
    }

    /// Snapshot of every tracked file's committed offset.
    pub fn positions(&self) -> Vec<PositionRecord> {
        self.files
            .values()
            .map(|tf| PositionRecord {
                inode: tf.identity().as_u64(),
                pos: tf.pos(),
                file: tf.path().to_path_buf(),
            })
            .collect()
    }

    /// Close handles of files untouched for longer than the idle timeout.
    /// Entries and offsets are retained; handles reopen lazily on the next
    /// read.
    pub fn close_idle(&mut self, now: DateTime<Utc>) {
        let idle_timeout = self.config.idle_timeout;
        for tf in self.files.values_mut() {
            if tf.is_open() && idle_for(tf, now) >= idle_timeout {
                tracing::debug!(file = %tf.path().display(), "Idle timeout, closing handle");
                tf.close_handle();
            }
        }
    }

    /// Close every open handle. Offsets are retained for the final snapshot.
    pub fn close_all(&mut self) {
        for tf in self.files.values_mut() {
            tf.close_handle();
        }
    }

    /// Evict least-recently-active open handles above the budget.
    fn enforce_handle_budget(&mut self) {
        let open: usize = self.files.values().filter(|tf| tf.is_open()).count();
        if open <= self.config.max_open_files {
            return;
        }
        let mut by_activity: Vec<(DateTime<Utc>, FileIdentity)> = self
            .files
            .values()
            .filter(|tf| tf.is_open())
            .map(|tf| (tf.last_active(), tf.identity()))
            .collect();
        by_activity.sort();
        let excess = open - self.config.max_open_files;
        for (_, identity) in by_activity.into_iter().take(excess) {
            if let Some(tf) = self.files.get_mut(&identity) {
                tracing::debug!(
                    file = %tf.path().display(),
                    "Open-handle budget exceeded, evicting"
                );
                tf.close_handle();
            }
        }
    }
}

fn idle_for(tf: &TailFile, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(tf.last_active())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn config() -> RegistryConfig {
        RegistryConfig {
            skip_to_end: false,
            file_header_key: None,
            idle_timeout: Duration::from_secs(120),
            max_open_files: 512,
            multiline: None,
        }
    }

    fn matched(path: &Path) -> MatchedPath {
        MatchedPath {
            path: path.to_path_buf(),
            headers: BTreeMap::new(),
        }
    }

    fn no_restore() -> HashMap<u64, u64> {
        HashMap::new()
    }

    #[test]
    fn test_new_file_tracked_at_offset_zero_and_dirty() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("a.log");
        fs::write(&path, b"hello\n").expect("write");

        let mut reg = Registry::new(config());
        reg.reconcile(&[matched(&path)], &no_restore(), Utc::now());

        assert_eq!(reg.len(), 1);
        let order = reg.consume_order();
        assert_eq!(order.len(), 1);
        let tf = reg.get_mut(order[0]).expect("tracked");
        assert_eq!(tf.pos(), 0);
        assert!(tf.is_dirty());
    }

    #[test]
    fn test_skip_to_end_starts_at_eof() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("a.log");
        fs::write(&path, b"old content\n").expect("write");

        let mut cfg = config();
        cfg.skip_to_end = true;
        let mut reg = Registry::new(cfg);
        reg.reconcile(&[matched(&path)], &no_restore(), Utc::now());

        assert!(reg.consume_order().is_empty(), "nothing to read at EOF");
    }

    #[test]
    fn test_restore_offset_applied_to_new_identity() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("a.log");
        fs::write(&path, b"X\nY\n").expect("write");
        let meta = fs::metadata(&path).expect("stat");
        let id = FileIdentity::from_metadata(&meta, &path);

        let mut restore = HashMap::new();
        restore.insert(id.as_u64(), 2u64);

        let mut reg = Registry::new(config());
        reg.reconcile(&[matched(&path)], &restore, Utc::now());
        let tf = reg.get_mut(id).expect("tracked");
        assert_eq!(tf.pos(), 2);
        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, b"Y");
    }

    #[test]
    fn test_restore_offset_beyond_length_restarts_from_zero() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("a.log");
        fs::write(&path, b"X\n").expect("write");
        let meta = fs::metadata(&path).expect("stat");
        let id = FileIdentity::from_metadata(&meta, &path);

        let mut restore = HashMap::new();
        restore.insert(id.as_u64(), 999u64);

        let mut reg = Registry::new(config());
        reg.reconcile(&[matched(&path)], &restore, Utc::now());
        assert_eq!(reg.get_mut(id).expect("tracked").pos(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_rename_in_place_keeps_offset() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("a.log");
        fs::write(&path, b"X\n").expect("write");

        let mut reg = Registry::new(config());
        reg.reconcile(&[matched(&path)], &no_restore(), Utc::now());
        let id = reg.consume_order()[0];
        {
            let tf = reg.get_mut(id).expect("tracked");
            tf.read_events(10, false, false, Utc::now()).expect("read");
            tf.commit_pos();
            assert_eq!(tf.pos(), 2);
        }

        let rotated = dir.path().join("a.log.1");
        fs::rename(&path, &rotated).expect("rename");
        reg.reconcile(&[matched(&rotated)], &no_restore(), Utc::now());

        assert_eq!(reg.len(), 1, "same identity, no duplicate entry");
        let tf = reg.get_mut(id).expect("tracked");
        assert_eq!(tf.path(), rotated);
        assert_eq!(tf.pos(), 2, "rename must not reset the offset");
    }

    #[test]
    fn test_truncation_resets_to_zero() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("a.log");
        fs::write(&path, b"0123456789\n").expect("write");

        let mut reg = Registry::new(config());
        reg.reconcile(&[matched(&path)], &no_restore(), Utc::now());
        let id = reg.consume_order()[0];
        {
            let tf = reg.get_mut(id).expect("tracked");
            tf.read_events(10, false, false, Utc::now()).expect("read");
            tf.commit_pos();
            assert_eq!(tf.pos(), 11);
        }

        fs::write(&path, b"new\n").expect("truncate");
        reg.reconcile(&[matched(&path)], &no_restore(), Utc::now());

        let tf = reg.get_mut(id).expect("tracked");
        assert_eq!(tf.pos(), 0, "truncation must reset the committed offset");
        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, b"new");
    }

    #[test]
    fn test_consume_order_ascending_by_mtime() {
        let dir = TempDir::new().expect("tmpdir");
        let mut reg = Registry::new(config());
        let now = Utc::now();
        let mut paths = Vec::new();
        for name in ["f1", "f2", "f3"] {
            let path = dir.path().join(name);
            fs::write(&path, b"x\n").expect("write");
            paths.push(matched(&path));
        }
        reg.reconcile(&paths, &no_restore(), now);

        // Re-stamp observations: f3 oldest, f1 newest.
        let ids = reg.consume_order();
        assert_eq!(ids.len(), 3);
        let by_name: HashMap<String, FileIdentity> = ids
            .iter()
            .map(|&id| {
                let name = reg
                    .get_mut(id)
                    .unwrap()
                    .path()
                    .file_name()
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .to_string();
                (name, id)
            })
            .collect();
        reg.get_mut(by_name["f3"]).unwrap().observe(2, now - TimeDelta::seconds(30), now);
        reg.get_mut(by_name["f2"]).unwrap().observe(2, now - TimeDelta::seconds(20), now);
        reg.get_mut(by_name["f1"]).unwrap().observe(2, now - TimeDelta::seconds(10), now);

        let order: Vec<String> = reg
            .consume_order()
            .into_iter()
            .map(|id| {
                reg.files[&id]
                    .path()
                    .file_name()
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(order, vec!["f3", "f2", "f1"]);
    }

    #[test]
    fn test_unmatched_file_removed_after_idle_timeout() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("a.log");
        fs::write(&path, b"x\n").expect("write");

        let mut cfg = config();
        cfg.idle_timeout = Duration::from_secs(60);
        let mut reg = Registry::new(cfg);
        let now = Utc::now();
        reg.reconcile(&[matched(&path)], &no_restore(), now);
        assert_eq!(reg.len(), 1);

        // Still within the idle window: retained.
        reg.reconcile(&[], &no_restore(), now + TimeDelta::seconds(30));
        assert_eq!(reg.len(), 1);

        // Idle window elapsed: untracked.
        reg.reconcile(&[], &no_restore(), now + TimeDelta::seconds(61));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn test_idle_close_releases_handle_but_keeps_entry() {
        let dir = TempDir::new().expect("tmpdir");
        let path = dir.path().join("a.log");
        fs::write(&path, b"x\n").expect("write");

        let mut cfg = config();
        cfg.idle_timeout = Duration::from_secs(60);
        let mut reg = Registry::new(cfg);
        let now = Utc::now();
        reg.reconcile(&[matched(&path)], &no_restore(), now);
        let id = reg.consume_order()[0];

        reg.close_idle(now + TimeDelta::seconds(61));
        let tf = reg.get_mut(id).expect("still tracked");
        assert!(!tf.is_open());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_handle_budget_evicts_least_recently_active() {
        let dir = TempDir::new().expect("tmpdir");
        let mut cfg = config();
        cfg.max_open_files = 1;
        let mut reg = Registry::new(cfg);

        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        fs::write(&a, b"a\n").expect("write");
        fs::write(&b, b"b\n").expect("write");

        let now = Utc::now();
        reg.reconcile(&[matched(&a), matched(&b)], &no_restore(), now);

        let open: usize = reg.files.values().filter(|tf| tf.is_open()).count();
        assert_eq!(open, 1, "budget must bound open handles");
        assert_eq!(reg.len(), 2, "evicted files stay tracked");

        // An evicted file still reads correctly via lazy reopen.
        for id in reg.consume_order() {
            let tf = reg.get_mut(id).expect("tracked");
            let records = tf.read_events(10, false, false, now).expect("read");
            assert_eq!(records.len(), 1);
        }
    }

    #[test]
    fn test_positions_snapshot_covers_all_tracked_files() {
        let dir = TempDir::new().expect("tmpdir");
        let a = dir.path().join("a.log");
        let b = dir.path().join("b.log");
        fs::write(&a, b"a\n").expect("write");
        fs::write(&b, b"b\n").expect("write");

        let mut reg = Registry::new(config());
        reg.reconcile(&[matched(&a), matched(&b)], &no_restore(), Utc::now());
        let positions = reg.positions();
        assert_eq!(positions.len(), 2);
        assert!(positions.iter().all(|p| p.pos == 0));
    }
}
