// logtail - app/source.rs
//
// The host-facing tailing source: configure -> start -> process* -> stop.
//
// Architecture:
//   - A single host-driven poller calls `process` sequentially; the core
//     does no internal parallelism while producing records.
//   - Two background threads share the mutable state under one coarse
//     mutex: the idle-checker closes handles of untouched files, and the
//     position-writer periodically rewrites the snapshot. Both sleep in
//     sub-intervals and watch an `Arc<AtomicBool>` cancel flag so `stop`
//     is prompt.
//   - Per dirty file, records are read in batch-sized chunks; each chunk is
//     delivered in one channel transaction. A commit promotes the file's
//     offset and rewrites the snapshot; a failed commit rolls back, rewinds
//     the file to its committed offset, and ends the cycle with Backoff.

use crate::app::channel::{Channel, Transaction};
use crate::app::config::{Context, SourceConfig};
use crate::core::model::{Record, SourceStatus};
use crate::core::position::PositionStore;
use crate::core::registry::{MatchedPath, Registry, RegistryConfig};
use crate::core::scanner::Scanner;
use crate::util::constants::{CANCEL_CHECK_INTERVAL_MS, IDLE_CHECK_INTERVAL_MS, MAX_OPEN_FILES};
use crate::util::error::{ChannelError, ConfigError, Result};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

struct Inner {
    registry: Registry,
    scanner: Scanner,
    positions: PositionStore,
    /// Offsets loaded from the snapshot at start, consulted when an
    /// identity is first tracked. Entries that never resolve are dropped
    /// from the snapshot at the next write.
    restore: HashMap<u64, u64>,
}

/// Tailing file source. Owns the channel reference and, once started, the
/// registry, scanner, and position store behind a single mutex shared with
/// the background threads.
pub struct TailSource {
    channel: Arc<dyn Channel>,
    config: Option<SourceConfig>,
    inner: Option<Arc<Mutex<Inner>>>,
    cancel: Option<Arc<AtomicBool>>,
    workers: Vec<JoinHandle<()>>,
}

impl TailSource {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self {
            channel,
            config: None,
            inner: None,
            cancel: None,
            workers: Vec::new(),
        }
    }

    /// Validate the context and compile patterns. Fatal errors here prevent
    /// `start`.
    pub fn configure(&mut self, ctx: &Context) -> Result<()> {
        let config = SourceConfig::from_context(ctx)?;
        tracing::info!(
            groups = config.groups.len(),
            position_file = %config.position_file.display(),
            multiline = config.multiline.is_some(),
            "Source configured"
        );
        self.config = Some(config);
        Ok(())
    }

    /// Load the position snapshot and spawn the background threads.
    pub fn start(&mut self) -> Result<()> {
        let config = self.config.clone().ok_or(ConfigError::NotConfigured)?;

        let positions = PositionStore::new(config.position_file.clone());
        let restore: HashMap<u64, u64> = positions
            .load()
            .into_iter()
            .map(|r| (r.inode, r.pos))
            .collect();

        let registry = Registry::new(RegistryConfig {
            skip_to_end: config.skip_to_end,
            file_header_key: config.file_header_key.clone(),
            idle_timeout: config.idle_timeout,
            max_open_files: MAX_OPEN_FILES,
            multiline: config.multiline.clone(),
        });

        let inner = Arc::new(Mutex::new(Inner {
            registry,
            scanner: Scanner::new(),
            positions,
            restore,
        }));
        let cancel = Arc::new(AtomicBool::new(false));

        let idle_inner = Arc::clone(&inner);
        let idle_cancel = Arc::clone(&cancel);
        self.workers.push(std::thread::spawn(move || {
            run_idle_checker(idle_inner, idle_cancel);
        }));

        let writer_inner = Arc::clone(&inner);
        let writer_cancel = Arc::clone(&cancel);
        let interval = config.write_pos_interval;
        self.workers.push(std::thread::spawn(move || {
            run_position_writer(writer_inner, interval, writer_cancel);
        }));

        self.inner = Some(inner);
        self.cancel = Some(cancel);
        tracing::info!("Source started");
        Ok(())
    }

    /// One poll cycle: refresh the matched set, reconcile the registry, and
    /// drain dirty files into channel transactions in consumption order.
    pub fn process(&mut self) -> Result<SourceStatus> {
        let config = self.config.as_ref().ok_or(ConfigError::NotConfigured)?;
        let inner_arc = Arc::clone(self.inner.as_ref().ok_or(ConfigError::NotConfigured)?);
        let mut guard = lock(&inner_arc);
        let inner = &mut *guard;
        let now = Utc::now();

        // Union of matched paths across groups, each tagged with its
        // group's headers. The first group to match a path wins.
        let mut matched: Vec<MatchedPath> = Vec::new();
        let mut seen_paths: HashSet<PathBuf> = HashSet::new();
        for group in &config.groups {
            for path in inner.scanner.resolve(&group.pattern) {
                if seen_paths.insert(path.clone()) {
                    matched.push(MatchedPath {
                        path,
                        headers: group.headers.clone(),
                    });
                }
            }
        }

        inner.registry.reconcile(&matched, &inner.restore, now);

        let mut total = 0usize;
        for identity in inner.registry.consume_order() {
            loop {
                let Some(tf) = inner.registry.get_mut(identity) else {
                    break;
                };
                let events = match tf.read_events(
                    config.batch_size,
                    config.backoff_without_nl,
                    config.byte_offset_header,
                    now,
                ) {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!(
                            file = %tf.path().display(),
                            error = %e,
                            "Read failed, skipping file this cycle"
                        );
                        break;
                    }
                };
                if events.is_empty() {
                    tf.clear_dirty();
                    break;
                }
                let count = events.len();

                let mut tx = self.channel.transaction();
                tx.begin();
                let mut delivered = put_all(tx.as_mut(), events);
                if delivered.is_ok() {
                    delivered = tx.commit();
                }
                match delivered {
                    Ok(()) => {
                        tx.close();
                        drop(tx);
                        tf.commit_pos();
                        let drained = count < config.batch_size;
                        if drained {
                            tf.clear_dirty();
                        }
                        total += count;

                        if let Err(e) = inner.positions.write(inner.registry.positions()) {
                            tracing::warn!(error = %e, "Snapshot write failed, offsets remain in memory");
                        }
                        if drained {
                            break;
                        }
                    }
                    Err(e) => {
                        tx.rollback();
                        tx.close();
                        drop(tx);
                        tracing::warn!(error = %e, "Transaction failed, rolling back");
                        if let Some(tf) = inner.registry.get_mut(identity) {
                            if let Err(reset_err) = tf.reset_to_committed() {
                                tracing::warn!(
                                    file = %tf.path().display(),
                                    error = %reset_err,
                                    "Rewind after rollback failed"
                                );
                            }
                        }
                        return Ok(SourceStatus::Backoff);
                    }
                }
            }
        }

        Ok(if total > 0 {
            tracing::debug!(records = total, "Cycle produced records");
            SourceStatus::Ready
        } else {
            SourceStatus::Backoff
        })
    }

    /// Cancel the background threads, write a final snapshot, and close all
    /// handles.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.store(true, Ordering::SeqCst);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        if let Some(inner_arc) = self.inner.take() {
            let mut guard = lock(&inner_arc);
            let inner = &mut *guard;
            if let Err(e) = inner.positions.write(inner.registry.positions()) {
                tracing::warn!(error = %e, "Final snapshot write failed");
            }
            inner.registry.close_all();
        }
        tracing::info!("Source stopped");
    }
}

fn put_all(tx: &mut dyn Transaction, events: Vec<Record>) -> std::result::Result<(), ChannelError> {
    for record in events {
        tx.put(record)?;
    }
    Ok(())
}

fn lock(inner: &Arc<Mutex<Inner>>) -> MutexGuard<'_, Inner> {
    // A panic while holding the lock leaves offsets merely stale, which the
    // at-least-once contract already tolerates.
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// =============================================================================
// Background threads
// =============================================================================

fn run_idle_checker(inner: Arc<Mutex<Inner>>, cancel: Arc<AtomicBool>) {
    let slices = (IDLE_CHECK_INTERVAL_MS / CANCEL_CHECK_INTERVAL_MS).max(1);
    loop {
        for _ in 0..slices {
            std::thread::sleep(Duration::from_millis(CANCEL_CHECK_INTERVAL_MS));
            if cancel.load(Ordering::Relaxed) {
                return;
            }
        }
        lock(&inner).registry.close_idle(Utc::now());
    }
}

fn run_position_writer(inner: Arc<Mutex<Inner>>, interval: Duration, cancel: Arc<AtomicBool>) {
    let interval_ms = (interval.as_millis() as u64).max(CANCEL_CHECK_INTERVAL_MS);
    let slices = (interval_ms / CANCEL_CHECK_INTERVAL_MS).max(1);
    loop {
        for _ in 0..slices {
            std::thread::sleep(Duration::from_millis(CANCEL_CHECK_INTERVAL_MS));
            if cancel.load(Ordering::Relaxed) {
                return;
            }
        }
        let mut guard = lock(&inner);
        let inner = &mut *guard;
        if let Err(e) = inner.positions.write_if_changed(inner.registry.positions()) {
            tracing::warn!(error = %e, "Background snapshot write failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
