//! Concurrent walker
//!
//! Directory scans are the schedulable unit: a bounded work queue feeds a
//! pool of named worker threads, each of which runs the shared
//! per-directory pipeline and enqueues the subdirectories it finds.
//! Emission order between directories is whatever scheduling produces;
//! within one scan batch it is the batch's own order.
//!
//! Completion is detected the way the queue defines it: empty and no
//! worker mid-scan, stable across a few consecutive checks so a worker
//! that just dequeued the last task cannot be missed.

use super::queue::{DirTask, WorkGuard, WorkQueue, WorkReceiver, WorkSender};
use super::{Prefix, WalkCore};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::fs::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Upper bound on pool threads regardless of the configured scan ceiling.
const MAX_SCAN_WORKERS: usize = 512;

/// Queue capacity; overflow is scanned inline by the discovering worker.
const WORK_QUEUE_CAPACITY: usize = 10_000;

/// Directory scans are I/O bound, so the pool oversubscribes the cores;
/// the configured scan ceiling caps it from above.
fn pool_size(concurrent_scans: usize) -> usize {
    concurrent_scans
        .min(num_cpus::get() * 2)
        .clamp(1, MAX_SCAN_WORKERS)
}

/// Parallel traversal with unspecified emission order.
pub struct ConcurrentWalker {
    core: WalkCore,
}

impl ConcurrentWalker {
    pub fn new(core: WalkCore) -> Self {
        Self { core }
    }

    /// Walk `start`, emitting matches through the core's visitor.
    /// Returns `Err` only for fatal start-path errors or cancellation.
    pub fn walk(&self, ctx: &CancelToken, start: &str) -> Result<()> {
        let info = self.core.root_info(ctx, start)?;
        if !info.is_dir() {
            // A non-directory start is emitted as-is, unfiltered.
            let entry = Entry {
                name: self.core.fs().base(start),
                file_type: info.file_type(),
            };
            self.core
                .visitor()
                .visit(start, "", Some(&entry), Some(&info), None);
            return Ok(());
        }

        let workers = pool_size(self.core.config().concurrent_scans);
        let queue = WorkQueue::new(WORK_QUEUE_CAPACITY);
        let seed = DirTask {
            path: start.to_string(),
            info,
        };
        match queue.sender().try_send(seed) {
            Ok(None) => {}
            Ok(Some(_)) | Err(()) => {
                return Err(crate::error::WorkerError::QueueDisconnected.into())
            }
        }

        let shutdown = AtomicBool::new(false);
        debug!(start, workers, "starting concurrent walk");

        let walk_result: Result<()> = thread::scope(|s| {
            for id in 0..workers {
                let rx = queue.receiver();
                let tx = queue.sender();
                let shutdown = &shutdown;
                let spawned = thread::Builder::new()
                    .name(format!("walker-{id}"))
                    .spawn_scoped(s, move || self.worker_loop(ctx, shutdown, &rx, &tx));
                if let Err(e) = spawned {
                    // Workers already running must see the flag before
                    // the scope joins them.
                    shutdown.store(true, Ordering::SeqCst);
                    return Err(crate::error::WorkerError::InitFailed {
                        id,
                        reason: e.to_string(),
                    }
                    .into());
                }
            }

            // Completion monitor; also the cancellation watchdog.
            let mut stable = 0;
            loop {
                if ctx.is_cancelled() {
                    break;
                }
                if queue.is_complete() {
                    stable += 1;
                    if stable >= 3 {
                        break;
                    }
                } else {
                    stable = 0;
                }
                thread::sleep(Duration::from_millis(10));
            }
            shutdown.store(true, Ordering::SeqCst);
            Ok(())
        });
        walk_result?;

        let stats = queue.stats();
        debug!(
            scanned = stats.dequeued.load(Ordering::Relaxed),
            inline = stats.inline_scans.load(Ordering::Relaxed),
            "concurrent walk finished"
        );
        ctx.check()
    }

    fn worker_loop(
        &self,
        ctx: &CancelToken,
        shutdown: &AtomicBool,
        rx: &WorkReceiver,
        tx: &WorkSender,
    ) {
        while !shutdown.load(Ordering::Relaxed) {
            if ctx.is_cancelled() {
                break;
            }
            let Some(task) = rx.recv_timeout(Duration::from_millis(10)) else {
                continue;
            };
            let _guard = WorkGuard::new(rx);
            self.process_dir(ctx, task, tx);
        }
    }

    /// Run the shared pipeline over one directory, scheduling discovered
    /// subdirectories (or scanning them inline under backpressure).
    fn process_dir(&self, ctx: &CancelToken, task: DirTask, tx: &WorkSender) {
        match self.core.check_prefix(ctx, &task.path, &task.info) {
            Ok(Prefix::Descend) => {}
            Ok(Prefix::Skip) | Err(_) => return,
        }
        trace!(path = %task.path, "scanning directory");

        let mut sc = self.core.fs().level_scanner(&task.path);
        let mut num_entries = 0i64;
        while sc.scan(ctx, self.core.config().scan_size) {
            let batch = sc.contents();
            num_entries += batch.len() as i64;
            let res = self
                .core
                .handle_contents(ctx, &task.path, &batch, num_entries, &mut |path, info| {
                    match tx.try_send(DirTask { path, info }) {
                        Ok(None) => {}
                        Ok(Some(bounced)) => {
                            tx.record_inline();
                            self.process_dir(ctx, bounced, tx);
                        }
                        Err(()) => return Err(crate::error::WorkerError::QueueDisconnected.into()),
                    }
                    Ok(())
                });
            if res.is_err() {
                // Cancellation (or a disconnected queue on shutdown);
                // stop scheduling work from this subtree.
                return;
            }
        }
        if let Some(err) = sc.take_err() {
            if !err.is_cancelled() {
                self.core.visitor().visit(&task.path, "", None, None, Some(&err));
            }
        }
        self.core.visitor().visit_dir_done(&task.path, num_entries);
    }
}
