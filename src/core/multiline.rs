// logtail - core/multiline.rs
//
// Regex-driven multiline aggregation.
//
// The aggregator consumes framed lines and merges them into multiline
// events. A pending event is force-emitted when its body reaches the byte
// cap, its line count reaches the line cap, or it has been pending longer
// than the stall timeout. Merged bodies join line bytes with a single LF
// per line that originally carried a terminator; CRLF terminators are not
// preserved inside merged bodies.
//
// Offsets: each pending event records the source byte offset at which its
// last line ended, so the reader can promote the committed position only up
// to fully emitted events.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::time::Duration;

/// Whether a line that does not match joins the previous or the next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Belong {
    Previous,
    Next,
}

/// Aggregation parameters from the `multiline*` configuration keys.
#[derive(Debug, Clone)]
pub struct MultilineSettings {
    /// Line boundary pattern.
    pub pattern: Regex,
    /// Join direction for pattern-matching lines.
    pub belong: Belong,
    /// Match polarity: when false, the regex match is inverted.
    pub matched: bool,
    /// Byte cap on a merged body.
    pub max_bytes: usize,
    /// Line cap on a merged body.
    pub max_lines: usize,
    /// Stall timeout for a pending event.
    pub timeout: Duration,
}

/// One input line as produced by the framer.
#[derive(Debug)]
pub struct InputLine {
    pub bytes: Vec<u8>,
    /// Whether the line carried an LF terminator in the source.
    pub terminated: bool,
    /// Source byte offset just past the line (terminator included).
    pub end_offset: u64,
}

/// A completed multiline event ready to become a record.
#[derive(Debug)]
pub struct MultilineEvent {
    pub body: Vec<u8>,
    /// When accumulation of this event started.
    pub started: DateTime<Utc>,
    /// Source byte offset at which the event's last line ended.
    pub end_offset: u64,
}

struct Pending {
    body: Vec<u8>,
    lines: usize,
    started: DateTime<Utc>,
    end_offset: u64,
}

impl Pending {
    fn new(started: DateTime<Utc>) -> Self {
        Self {
            body: Vec::new(),
            lines: 0,
            started,
            end_offset: 0,
        }
    }

    fn append(&mut self, line: &InputLine) {
        self.body.extend_from_slice(&line.bytes);
        if line.terminated {
            self.body.push(b'\n');
        }
        self.lines += 1;
        self.end_offset = line.end_offset;
    }

    fn into_event(self) -> MultilineEvent {
        MultilineEvent {
            body: self.body,
            started: self.started,
            end_offset: self.end_offset,
        }
    }
}

/// Stateful multiline accumulator, one per tailed file.
pub struct Aggregator {
    settings: MultilineSettings,
    pending: Option<Pending>,
}

impl Aggregator {
    pub fn new(settings: MultilineSettings) -> Self {
        Self {
            settings,
            pending: None,
        }
    }

    /// Discard any pending event. Used on rollback, truncation, and
    /// restart-from-snapshot, where the pending bytes will be re-read.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Emit the pending event if it has stalled past the timeout. Checked at
    /// the start of each poll.
    pub fn take_expired(&mut self, now: DateTime<Utc>) -> Option<MultilineEvent> {
        let expired = self.pending.as_ref().is_some_and(|p| {
            let age = now.signed_duration_since(p.started);
            age.to_std().unwrap_or(Duration::ZERO) > self.settings.timeout
        });
        if expired {
            self.pending.take().map(Pending::into_event)
        } else {
            None
        }
    }

    /// Feed one framed line; returns the events completed by it (possibly
    /// none, at most two: a close caused by a non-matching line plus a
    /// cap-triggered flush of the replacement).
    pub fn offer(&mut self, line: InputLine, now: DateTime<Utc>) -> Vec<MultilineEvent> {
        let is_match =
            self.settings.pattern.is_match(&String::from_utf8_lossy(&line.bytes))
                == self.settings.matched;

        let mut out = Vec::new();
        match self.settings.belong {
            Belong::Previous => {
                if !is_match {
                    // A non-matching line closes the pending event and starts
                    // the next one.
                    if let Some(p) = self.pending.take() {
                        out.push(p.into_event());
                    }
                }
                self.pending
                    .get_or_insert_with(|| Pending::new(now))
                    .append(&line);
            }
            Belong::Next => {
                self.pending
                    .get_or_insert_with(|| Pending::new(now))
                    .append(&line);
                if !is_match {
                    if let Some(p) = self.pending.take() {
                        out.push(p.into_event());
                    }
                }
            }
        }

        if let Some(p) = &self.pending {
            if p.body.len() >= self.settings.max_bytes || p.lines >= self.settings.max_lines {
                if let Some(p) = self.pending.take() {
                    out.push(p.into_event());
                }
            }
        }
        out
    }

    /// Whether lines are currently held in an unemitted pending event.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
