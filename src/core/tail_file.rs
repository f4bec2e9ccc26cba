// logtail - core/tail_file.rs
//
// Stateful reader over one tailed file: buffered append-only byte reading,
// LF/CRLF line framing, optional multiline aggregation, and the two-cursor
// offset protocol.
//
// Offsets:
//   - `pos` is the committed offset: the highest byte for which records have
//     been durably accepted downstream. Persisted in the position snapshot.
//   - `line_read_pos` is the tentative read cursor; always >= `pos`. It
//     advances by the exact number of source bytes each framed line
//     consumed, terminator included.
//   - `emitted_pos` trails `line_read_pos` only in multiline mode, where
//     consumed lines may be held in a pending (unemitted) accumulator.
//     Commits promote `pos` to `emitted_pos`, never past it, so pending
//     bytes are re-read after a restart.
//
// The commit protocol is: reader emits, channel commits, offsets promote.
// `pos` is never promoted before a commit. Rollback rewinds the read cursor
// to `pos` and discards all framing carry-over so the same bytes are
// re-read.

use crate::core::model::{FileIdentity, Record};
use crate::core::multiline::{Aggregator, InputLine, MultilineEvent, MultilineSettings};
use crate::util::constants::{
    BUFFER_SIZE, BYTE_OFFSET_HEADER_KEY, MULTILINE_HEADER_KEY, MULTILINE_TIMESTAMP_HEADER_KEY,
};
use crate::util::error::{Result, TailError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

// =============================================================================
// Line framer
// =============================================================================

/// One framed line from the raw byte stream.
#[derive(Debug)]
struct FramedLine {
    /// Line payload, trailing LF (and a CR immediately before it) stripped.
    bytes: Vec<u8>,
    /// Whether the line ended in an LF in the source.
    terminated: bool,
    /// Exact number of source bytes consumed, terminator included.
    consumed: u64,
}

/// Two-tier buffered scanner: a fixed fill buffer refilled from the file,
/// plus a carry-over buffer for bytes from prior fills that did not yet
/// terminate in LF.
struct LineFramer {
    buf: Box<[u8]>,
    len: usize,
    pos: usize,
    carry: Vec<u8>,
}

impl LineFramer {
    fn new() -> Self {
        Self {
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            len: 0,
            pos: 0,
            carry: Vec::new(),
        }
    }

    /// Discard all buffered bytes. The file cursor must be re-seeked by the
    /// caller; buffered bytes ahead of the logical read position are lost.
    fn reset(&mut self) {
        self.len = 0;
        self.pos = 0;
        self.carry.clear();
    }

    /// Produce the next framed line, refilling from `file` as needed.
    /// Returns a partial (unterminated) line at end of file when carry-over
    /// bytes are pending, and `None` at a clean end of file.
    fn next_line(&mut self, file: &mut File) -> std::io::Result<Option<FramedLine>> {
        loop {
            if let Some(i) = self.buf[self.pos..self.len].iter().position(|&b| b == b'\n') {
                let mut bytes = std::mem::take(&mut self.carry);
                bytes.extend_from_slice(&self.buf[self.pos..self.pos + i]);
                // Consumed bytes count any CR still in `bytes` plus the LF.
                let consumed = bytes.len() as u64 + 1;
                if bytes.last() == Some(&b'\r') {
                    bytes.pop();
                }
                self.pos += i + 1;
                return Ok(Some(FramedLine {
                    bytes,
                    terminated: true,
                    consumed,
                }));
            }

            self.carry.extend_from_slice(&self.buf[self.pos..self.len]);
            self.pos = self.len;

            let read = file.read(&mut self.buf)?;
            if read == 0 {
                if self.carry.is_empty() {
                    return Ok(None);
                }
                let bytes = std::mem::take(&mut self.carry);
                let consumed = bytes.len() as u64;
                return Ok(Some(FramedLine {
                    bytes,
                    terminated: false,
                    consumed,
                }));
            }
            self.len = read;
            self.pos = 0;
        }
    }
}

// =============================================================================
// TailFile
// =============================================================================

/// One tracked file: identity, open handle, offsets, and framing state.
/// Owned exclusively by the registry.
pub struct TailFile {
    identity: FileIdentity,
    path: PathBuf,
    file: Option<File>,
    pos: u64,
    line_read_pos: u64,
    emitted_pos: u64,
    /// File mtime at the last observation; drives consumption order.
    last_updated: DateTime<Utc>,
    /// Wall clock of the last open, read, or new-content observation;
    /// drives idle close and handle eviction.
    last_active: DateTime<Utc>,
    /// File size at the last observation, for growth detection.
    observed_size: u64,
    /// Whether the file may have unread content.
    dirty: bool,
    headers: BTreeMap<String, String>,
    framer: LineFramer,
    aggregator: Option<Aggregator>,
}

impl TailFile {
    /// Open `path` for tailing. The identity is derived from the opened
    /// handle's metadata so a concurrent replacement cannot be mistaken for
    /// the stat'ed file. Starts at offset 0, or at end of file when
    /// `start_at_end` is set.
    pub fn open(
        path: &Path,
        headers: BTreeMap<String, String>,
        multiline: Option<MultilineSettings>,
        start_at_end: bool,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| TailError::Io {
            path: path.to_path_buf(),
            operation: "open",
            source: e,
        })?;
        let meta = file.metadata().map_err(|e| TailError::Io {
            path: path.to_path_buf(),
            operation: "stat",
            source: e,
        })?;

        let size = meta.len();
        let offset = if start_at_end { size } else { 0 };
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).map_err(|e| TailError::Io {
                path: path.to_path_buf(),
                operation: "seek",
                source: e,
            })?;
        }

        let mtime = meta.modified().map(DateTime::<Utc>::from).unwrap_or(now);

        Ok(Self {
            identity: FileIdentity::from_metadata(&meta, path),
            path: path.to_path_buf(),
            file: Some(file),
            pos: offset,
            line_read_pos: offset,
            emitted_pos: offset,
            last_updated: mtime,
            last_active: now,
            observed_size: size,
            dirty: offset < size,
            headers,
            framer: LineFramer::new(),
            aggregator: multiline.map(Aggregator::new),
        })
    }

    pub fn identity(&self) -> FileIdentity {
        self.identity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn line_read_pos(&self) -> u64 {
        self.line_read_pos
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    pub fn observed_size(&self) -> u64 {
        self.observed_size
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether a multiline event is pending. Pending files stay in the
    /// consumption set even when clean, so the stall timeout can fire on a
    /// later poll without new bytes arriving.
    pub fn has_pending_event(&self) -> bool {
        self.aggregator
            .as_ref()
            .is_some_and(|agg| agg.has_pending())
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Record a new-content observation from the registry: the file grew or
    /// its mtime advanced.
    pub fn observe(&mut self, size: u64, mtime: DateTime<Utc>, now: DateTime<Utc>) {
        self.observed_size = size;
        self.last_updated = mtime;
        self.last_active = now;
        self.dirty = true;
    }

    /// Rename-in-place: the identity is unchanged, so offsets are kept.
    /// Updates the path header when one is configured.
    pub fn set_path(&mut self, path: &Path, file_header_key: Option<&str>) {
        tracing::info!(
            from = %self.path.display(),
            to = %path.display(),
            "Tracked file renamed"
        );
        self.path = path.to_path_buf();
        if let Some(key) = file_header_key {
            self.headers
                .insert(key.to_string(), path.display().to_string());
        }
    }

    // -------------------------------------------------------------------------
    // Offset protocol
    // -------------------------------------------------------------------------

    /// Seek to a checkpointed offset, applied only when `identity` still
    /// names this file. Resets the read cursor and discards all framing
    /// state. Used on restart-from-snapshot and on truncation recovery.
    pub fn update_pos(&mut self, path: &Path, identity: FileIdentity, pos: u64) -> Result<bool> {
        if identity != self.identity {
            tracing::debug!(
                file = %path.display(),
                "Checkpoint identity does not match open file, ignoring"
            );
            return Ok(false);
        }
        self.pos = pos;
        self.seek_read_cursor(pos)?;
        Ok(true)
    }

    /// Promote the committed offset after a successful channel commit.
    /// Framer read-ahead and a pending multiline accumulator survive, so
    /// commits do not restart multiline accumulation.
    pub fn commit_pos(&mut self) {
        self.pos = self.emitted_pos;
    }

    /// Rollback: rewind the read cursor to the committed offset and discard
    /// framing carry-over and any pending multiline event, so the same
    /// bytes are re-read.
    pub fn reset_to_committed(&mut self) -> Result<()> {
        let pos = self.pos;
        self.seek_read_cursor(pos)
    }

    fn seek_read_cursor(&mut self, offset: u64) -> Result<()> {
        if let Some(file) = &mut self.file {
            file.seek(SeekFrom::Start(offset)).map_err(|e| TailError::Io {
                path: self.path.clone(),
                operation: "seek",
                source: e,
            })?;
        }
        self.line_read_pos = offset;
        self.emitted_pos = offset;
        self.framer.reset();
        if let Some(agg) = &mut self.aggregator {
            agg.reset();
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Handle lifecycle
    // -------------------------------------------------------------------------

    /// Release the handle, retaining all offsets. Buffered read-ahead is
    /// discarded; the reopened handle seeks back to the read cursor.
    pub fn close_handle(&mut self) {
        if self.file.take().is_some() {
            tracing::debug!(file = %self.path.display(), "Handle closed");
            self.framer.reset();
        }
    }

    fn ensure_open(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        let mut file = File::open(&self.path).map_err(|e| TailError::Io {
            path: self.path.clone(),
            operation: "reopen",
            source: e,
        })?;
        file.seek(SeekFrom::Start(self.line_read_pos))
            .map_err(|e| TailError::Io {
                path: self.path.clone(),
                operation: "seek",
                source: e,
            })?;
        tracing::debug!(
            file = %self.path.display(),
            offset = self.line_read_pos,
            "Handle reopened"
        );
        self.file = Some(file);
        self.last_active = now;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    /// Produce up to `n` framed records. May return fewer, including zero,
    /// when no complete record is available.
    ///
    /// With `backoff_without_nl`, a trailing partial line (no terminator) is
    /// withheld: the read cursor is rewound to the start of the partial so
    /// the bytes are re-read next cycle once more data arrives. Otherwise
    /// the partial is emitted as a record.
    pub fn read_events(
        &mut self,
        n: usize,
        backoff_without_nl: bool,
        add_byte_offset: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<Record>> {
        let mut out = Vec::new();

        // A stalled multiline event flushes even when no new bytes arrive.
        let expired = self
            .aggregator
            .as_mut()
            .and_then(|agg| agg.take_expired(now));
        if let Some(ev) = expired {
            self.emitted_pos = ev.end_offset.max(self.emitted_pos);
            out.push(multiline_record(&self.headers, ev));
        }

        // Once an event is out of the accumulator it must reach the caller:
        // from here on, an I/O failure delivers what was already framed and
        // surfaces the error on the next cycle instead.
        if let Err(e) = self.ensure_open(now) {
            if out.is_empty() {
                return Err(e);
            }
            tracing::warn!(file = %self.path.display(), error = %e, "Reopen failed");
            return Ok(out);
        }

        while out.len() < n {
            let start = self.line_read_pos;
            let Some(file) = &mut self.file else { break };
            let framed = match self.framer.next_line(file) {
                Ok(framed) => framed,
                Err(e) if out.is_empty() => {
                    return Err(TailError::Io {
                        path: self.path.clone(),
                        operation: "read",
                        source: e,
                    })
                }
                Err(e) => {
                    tracing::warn!(file = %self.path.display(), error = %e, "Read failed mid-batch");
                    break;
                }
            };
            let Some(line) = framed else { break };

            if !line.terminated && backoff_without_nl {
                // Withhold the partial: seek back to its first byte and
                // drop it from the framer so it is re-read next cycle. If
                // the seek fails, closing the handle gets the same effect
                // through the reopen path.
                let seek_result = match self.file.as_mut() {
                    Some(file) => file.seek(SeekFrom::Start(start)).map(|_| ()),
                    None => Ok(()),
                };
                if let Err(e) = seek_result {
                    tracing::warn!(file = %self.path.display(), error = %e, "Rewind seek failed");
                    self.close_handle();
                }
                self.framer.reset();
                break;
            }

            self.line_read_pos = start + line.consumed;
            self.last_active = now;

            match &mut self.aggregator {
                None => {
                    let mut headers = self.headers.clone();
                    if add_byte_offset {
                        headers.insert(BYTE_OFFSET_HEADER_KEY.to_string(), start.to_string());
                    }
                    self.emitted_pos = self.line_read_pos;
                    out.push(Record::new(line.bytes, headers));
                }
                Some(agg) => {
                    let input = InputLine {
                        bytes: line.bytes,
                        terminated: line.terminated,
                        end_offset: self.line_read_pos,
                    };
                    let events = agg.offer(input, now);
                    for ev in events {
                        self.emitted_pos = ev.end_offset.max(self.emitted_pos);
                        out.push(multiline_record(&self.headers, ev));
                    }
                }
            }
        }

        Ok(out)
    }
}

fn multiline_record(headers: &BTreeMap<String, String>, ev: MultilineEvent) -> Record {
    let mut headers = headers.clone();
    headers.insert(MULTILINE_HEADER_KEY.to_string(), "true".to_string());
    headers.insert(
        MULTILINE_TIMESTAMP_HEADER_KEY.to_string(),
        ev.started.timestamp_millis().to_string(),
    );
    Record::new(ev.body, headers)
}

impl std::fmt::Debug for TailFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailFile")
            .field("identity", &self.identity)
            .field("path", &self.path)
            .field("open", &self.file.is_some())
            .field("pos", &self.pos)
            .field("line_read_pos", &self.line_read_pos)
            .field("dirty", &self.dirty)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::multiline::Belong;
    use regex::Regex;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).expect("write");
        path
    }

    fn append(path: &Path, content: &[u8]) {
        let mut f = OpenOptions::new().append(true).open(path).expect("open");
        f.write_all(content).expect("append");
    }

    fn open_tail(path: &Path) -> TailFile {
        TailFile::open(path, BTreeMap::new(), None, false, Utc::now()).expect("open tail")
    }

    fn bodies(records: &[Record]) -> Vec<String> {
        records.iter().map(|r| r.body_str().into_owned()).collect()
    }

    #[test]
    fn test_lf_framing() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"X\nY\n");
        let mut tf = open_tail(&path);

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["X", "Y"]);
        assert_eq!(tf.line_read_pos(), 4);
    }

    #[test]
    fn test_crlf_framing_strips_carriage_return() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"X\r\nY\r\n");
        let mut tf = open_tail(&path);

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["X", "Y"]);
        // The cursor covers the stripped CRLF bytes.
        assert_eq!(tf.line_read_pos(), 6);
    }

    #[test]
    fn test_backoff_without_nl_withholds_partial() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"X");
        let mut tf = open_tail(&path);

        let records = tf.read_events(10, true, false, Utc::now()).expect("read");
        assert!(records.is_empty(), "partial line must be withheld");
        assert_eq!(tf.line_read_pos(), 0);

        append(&path, b"\n");
        let records = tf.read_events(10, true, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["X"]);
        assert_eq!(tf.line_read_pos(), 2);
    }

    #[test]
    fn test_partial_emitted_without_backoff() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"X\npartial");
        let mut tf = open_tail(&path);

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["X", "partial"]);
        assert_eq!(tf.line_read_pos(), 9);
    }

    #[test]
    fn test_line_spanning_fill_buffers() {
        let dir = TempDir::new().expect("tmpdir");
        let long = vec![b'a'; BUFFER_SIZE + 1000];
        let mut content = long.clone();
        content.push(b'\n');
        content.extend_from_slice(b"tail\n");
        let path = write_file(&dir, "a.log", &content);
        let mut tf = open_tail(&path);

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].body, long);
        assert_eq!(records[1].body, b"tail");
        assert_eq!(tf.line_read_pos(), content.len() as u64);
    }

    #[test]
    fn test_byte_offset_header_records_start_of_record() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"ab\ncd\n");
        let mut tf = open_tail(&path);

        let records = tf.read_events(10, false, true, Utc::now()).expect("read");
        assert_eq!(records[0].headers.get(BYTE_OFFSET_HEADER_KEY).unwrap(), "0");
        assert_eq!(records[1].headers.get(BYTE_OFFSET_HEADER_KEY).unwrap(), "3");
    }

    #[test]
    fn test_rollback_re_reads_same_bytes() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"X\nY\n");
        let mut tf = open_tail(&path);

        let first = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(first.len(), 2);
        assert_eq!(tf.pos(), 0, "pos must not move before a commit");

        tf.reset_to_committed().expect("rollback");
        assert_eq!(tf.line_read_pos(), 0);

        let again = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&again), vec!["X", "Y"]);
    }

    #[test]
    fn test_commit_promotes_pos_and_later_reads_continue() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"X\n");
        let mut tf = open_tail(&path);

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(records.len(), 1);
        tf.commit_pos();
        assert_eq!(tf.pos(), 2);

        append(&path, b"Y\n");
        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["Y"]);
        tf.commit_pos();
        assert_eq!(tf.pos(), 4);
    }

    #[test]
    fn test_update_pos_seeks_when_identity_matches() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"X\nY\n");
        let mut tf = open_tail(&path);
        let id = tf.identity();

        assert!(tf.update_pos(&path, id, 2).expect("update"));
        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["Y"]);

        let other = FileIdentity::from_raw(id.as_u64().wrapping_add(1));
        assert!(!tf.update_pos(&path, other, 0).expect("update"));
    }

    #[test]
    fn test_close_handle_retains_offsets_and_reopens() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"X\n");
        let mut tf = open_tail(&path);

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(records.len(), 1);
        tf.commit_pos();
        tf.close_handle();
        assert!(!tf.is_open());

        append(&path, b"Y\n");
        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["Y"]);
        assert!(tf.is_open());
    }

    #[test]
    fn test_batch_limit_respected() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"1\n2\n3\n");
        let mut tf = open_tail(&path);

        let records = tf.read_events(2, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["1", "2"]);
        let records = tf.read_events(2, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["3"]);
    }

    fn multiline_settings() -> MultilineSettings {
        MultilineSettings {
            pattern: Regex::new(r"^\s").expect("regex"),
            belong: Belong::Previous,
            matched: true,
            max_bytes: 1024 * 1024,
            max_lines: 100,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_multiline_pending_bytes_are_not_committed() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"ERROR boom\n  at one\nINFO next\n");
        let mut tf = TailFile::open(
            &path,
            BTreeMap::new(),
            Some(multiline_settings()),
            false,
            Utc::now(),
        )
        .expect("open tail");

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["ERROR boom\n  at one\n"]);
        assert_eq!(records[0].headers.get(MULTILINE_HEADER_KEY).unwrap(), "true");
        assert!(records[0].headers.contains_key(MULTILINE_TIMESTAMP_HEADER_KEY));

        // "INFO next" is pending: the read cursor is past it but a commit
        // only covers the emitted event.
        assert_eq!(tf.line_read_pos(), 30);
        tf.commit_pos();
        assert_eq!(tf.pos(), 20);
    }

    #[test]
    fn test_multiline_stalled_event_flushes_on_later_poll() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"ERROR boom\n");
        let mut settings = multiline_settings();
        settings.timeout = Duration::from_millis(0);
        let mut tf =
            TailFile::open(&path, BTreeMap::new(), Some(settings), false, Utc::now())
                .expect("open tail");

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert!(records.is_empty(), "event is pending, nothing to emit yet");

        let later = Utc::now() + chrono::TimeDelta::seconds(1);
        let records = tf.read_events(10, false, false, later).expect("read");
        assert_eq!(bodies(&records), vec!["ERROR boom\n"]);
        tf.commit_pos();
        assert_eq!(tf.pos(), 11);
    }

    #[test]
    fn test_rollback_discards_pending_multiline_event() {
        let dir = TempDir::new().expect("tmpdir");
        let path = write_file(&dir, "a.log", b"ERROR boom\n");
        let mut tf = TailFile::open(
            &path,
            BTreeMap::new(),
            Some(multiline_settings()),
            false,
            Utc::now(),
        )
        .expect("open tail");

        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert!(records.is_empty());
        tf.reset_to_committed().expect("rollback");
        assert_eq!(tf.line_read_pos(), 0);

        // The same bytes accumulate again from scratch.
        append(&path, b"INFO next\n");
        let records = tf.read_events(10, false, false, Utc::now()).expect("read");
        assert_eq!(bodies(&records), vec!["ERROR boom\n"]);
    }
}
