//! Asynchronous stat batching
//!
//! Directory listings arrive in batches of names; turning them into
//! metadata means one stat call per entry. Small batches are stat'd
//! inline because thread hand-off costs more than the calls themselves;
//! once a batch reaches the async threshold the calls fan out over scoped
//! worker threads, never more than the configured ceiling at once.
//!
//! Per-entry failures are reported through the visitor and the entry is
//! dropped from the results; the batch as a whole only fails on
//! cancellation.

use super::Visitor;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::fs::{Entry, FileInfo, FileSystem};
use std::sync::Arc;
use std::thread;
use tracing::trace;

/// Which stat call the batcher issues, fixed at construction according
/// to whether symbolic links are being followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatMode {
    /// Follow symbolic links.
    Stat,
    /// Do not follow symbolic links.
    Lstat,
}

/// Issues stat calls for directory entries with bounded concurrency.
pub struct StatBatcher {
    fs: Arc<dyn FileSystem>,
    visitor: Arc<dyn Visitor>,
    concurrency: usize,
    threshold: usize,
    mode: StatMode,
}

impl StatBatcher {
    /// `concurrency` bounds in-flight calls; batches smaller than
    /// `threshold` are processed sequentially. `visitor` receives
    /// per-entry failures.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        visitor: Arc<dyn Visitor>,
        concurrency: usize,
        threshold: usize,
        mode: StatMode,
    ) -> Self {
        Self {
            fs,
            visitor,
            concurrency: concurrency.max(1),
            threshold,
            mode,
        }
    }

    fn stat_entry(&self, ctx: &CancelToken, parent: &str, name: &str) -> Result<FileInfo> {
        let path = self.fs.join(parent, name);
        match self.mode {
            StatMode::Stat => self.fs.stat(ctx, &path),
            StatMode::Lstat => self.fs.lstat(ctx, &path),
        }
    }

    /// Fill one result slot, routing failures to the visitor. Returns
    /// `false` once cancellation is observed.
    fn fill_slot(
        &self,
        ctx: &CancelToken,
        parent: &str,
        entry: &Entry,
        slot: &mut Option<FileInfo>,
    ) -> bool {
        match self.stat_entry(ctx, parent, &entry.name) {
            Ok(info) => {
                *slot = Some(info);
                true
            }
            Err(err) if err.is_cancelled() => false,
            Err(err) => {
                self.visitor
                    .visit(parent, &entry.name, Some(entry), None, Some(&err));
                true
            }
        }
    }

    /// Stat every entry of one scan batch.
    ///
    /// Returns `(dirs_info, all_info)`: `all_info` preserves input order
    /// for every successfully stat'd entry, `dirs_info` is its
    /// directory-typed subset. The only error is cancellation.
    pub fn process(
        &self,
        ctx: &CancelToken,
        parent: &str,
        entries: &[Entry],
    ) -> Result<(Vec<FileInfo>, Vec<FileInfo>)> {
        ctx.check()?;
        let n = entries.len();
        let mut slots: Vec<Option<FileInfo>> = vec![None; n];

        if n < self.threshold {
            for (entry, slot) in entries.iter().zip(slots.iter_mut()) {
                if ctx.is_cancelled() || !self.fill_slot(ctx, parent, entry, slot) {
                    break;
                }
            }
        } else {
            let workers = self.concurrency.min(n);
            let chunk = n.div_ceil(workers);
            trace!(parent, entries = n, workers, "batching stat calls");
            thread::scope(|s| {
                for (ents, outs) in entries.chunks(chunk).zip(slots.chunks_mut(chunk)) {
                    s.spawn(move || {
                        for (entry, slot) in ents.iter().zip(outs.iter_mut()) {
                            if ctx.is_cancelled() || !self.fill_slot(ctx, parent, entry, slot) {
                                return;
                            }
                        }
                    });
                }
            });
        }

        ctx.check()?;
        let all: Vec<FileInfo> = slots.into_iter().flatten().collect();
        let dirs = all.iter().filter(|i| i.is_dir()).cloned().collect();
        Ok((dirs, all))
    }
}
