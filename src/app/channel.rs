// logtail - app/channel.rs
//
// The downstream transactional sink contract, plus two implementations:
// an in-memory channel used by the test harnesses and a line-delimited
// JSON stdout channel used by the CLI binary.
//
// The source always drives a transaction in the order
// `begin -> put* -> (commit | rollback) -> close`.

use crate::core::model::Record;
use crate::util::error::ChannelError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// A transactional batch sink.
pub trait Channel: Send + Sync {
    /// Open a new transaction. One transaction carries one batch.
    fn transaction(&self) -> Box<dyn Transaction + '_>;
}

/// A single batch transaction. Either every put record commits, or none do.
pub trait Transaction {
    fn begin(&mut self);
    fn put(&mut self, record: Record) -> Result<(), ChannelError>;
    fn commit(&mut self) -> Result<(), ChannelError>;
    fn rollback(&mut self);
    fn close(&mut self);
}

// =============================================================================
// MemoryChannel
// =============================================================================

#[derive(Default)]
struct MemoryState {
    committed: Vec<Record>,
    fail_commits: usize,
}

/// In-memory channel: commits append to a shared vector. Commit failures
/// can be injected to exercise the rollback path.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail.
    pub fn fail_next_commits(&self, n: usize) {
        self.lock().fail_commits = n;
    }

    /// Drain all committed records.
    pub fn take_committed(&self) -> Vec<Record> {
        std::mem::take(&mut self.lock().committed)
    }

    pub fn committed_len(&self) -> usize {
        self.lock().committed.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Channel for MemoryChannel {
    fn transaction(&self) -> Box<dyn Transaction + '_> {
        Box::new(MemoryTransaction {
            channel: self,
            staged: Vec::new(),
        })
    }
}

struct MemoryTransaction<'a> {
    channel: &'a MemoryChannel,
    staged: Vec<Record>,
}

impl Transaction for MemoryTransaction<'_> {
    fn begin(&mut self) {
        self.staged.clear();
    }

    fn put(&mut self, record: Record) -> Result<(), ChannelError> {
        self.staged.push(record);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ChannelError> {
        let mut state = self.channel.lock();
        if state.fail_commits > 0 {
            state.fail_commits -= 1;
            return Err(ChannelError::Rejected {
                reason: "injected commit failure".to_string(),
            });
        }
        state.committed.append(&mut self.staged);
        Ok(())
    }

    fn rollback(&mut self) {
        self.staged.clear();
    }

    fn close(&mut self) {
        self.staged.clear();
    }
}

// =============================================================================
// StdoutChannel
// =============================================================================

/// Serialised shape of one delivered record.
#[derive(Serialize)]
struct RecordLine<'a> {
    body: &'a str,
    headers: &'a BTreeMap<String, String>,
}

/// Writes each committed record as one JSON object per line on stdout.
/// Records are staged until commit so a rolled-back batch emits nothing.
#[derive(Default)]
pub struct StdoutChannel;

impl StdoutChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Channel for StdoutChannel {
    fn transaction(&self) -> Box<dyn Transaction + '_> {
        Box::new(StdoutTransaction { staged: Vec::new() })
    }
}

struct StdoutTransaction {
    staged: Vec<Record>,
}

impl Transaction for StdoutTransaction {
    fn begin(&mut self) {
        self.staged.clear();
    }

    fn put(&mut self, record: Record) -> Result<(), ChannelError> {
        self.staged.push(record);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ChannelError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for record in self.staged.drain(..) {
            let body = record.body_str();
            let line = RecordLine {
                body: body.as_ref(),
                headers: &record.headers,
            };
            let json = serde_json::to_string(&line)
                .map_err(|e| ChannelError::Io { source: e.into() })?;
            writeln!(out, "{json}").map_err(|e| ChannelError::Io { source: e })?;
        }
        out.flush().map_err(|e| ChannelError::Io { source: e })
    }

    fn rollback(&mut self) {
        self.staged.clear();
    }

    fn close(&mut self) {
        self.staged.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
