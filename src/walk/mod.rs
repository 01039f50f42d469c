//! Traversal engine
//!
//! Two walkers share one per-directory pipeline and differ only in
//! scheduling:
//!
//! ```text
//!                ┌────────────────────────────┐
//!                │         WalkCore           │
//!                │  prefix checks (exclude,   │
//!                │  same-device, prune)       │
//!                │  per-batch predicate +     │
//!                │  stat batching + emission  │
//!                └──────┬──────────────┬──────┘
//!                       │              │
//!            ┌──────────▼───┐   ┌──────▼──────────┐
//!            │ Concurrent   │   │ DepthFirst      │
//!            │ work queue + │   │ single-threaded │
//!            │ worker pool  │   │ ordered descent │
//!            └──────────────┘   └─────────────────┘
//! ```
//!
//! The concurrent walker emits in scheduling order and scales with the
//! directory-scan ceiling; the depth-first walker emits a strict DFS of
//! the tree in scanner order. Directories are emitted by the directory
//! that lists them, never by their own prefix step, so an entry appears
//! exactly once either way.

mod concurrent;
mod depth_first;
mod filter;
mod queue;
mod stat_batch;

pub use concurrent::ConcurrentWalker;
pub use depth_first::DepthFirstWalker;
pub use filter::{Exclusions, SameDevice};
pub use stat_batch::{StatBatcher, StatMode};

use crate::cancel::CancelToken;
use crate::error::{ConfigError, Result, UfindError};
use crate::expr::{AttrView, Expression};
use crate::fs::{Entry, FileInfo, FileSystem};
use std::collections::HashMap;
use std::sync::Arc;

/// Output sink for walk results.
///
/// One call per emitted entry. When `err` is set, the call is an error
/// report for `join(parent, name)` (for `parent` itself when `name` is
/// empty) and the remaining fields are unspecified. The concurrent
/// walker calls this from many threads; implementations synchronize
/// their own state.
pub trait Visitor: Send + Sync {
    fn visit(
        &self,
        parent: &str,
        name: &str,
        entry: Option<&Entry>,
        info: Option<&FileInfo>,
        err: Option<&UfindError>,
    );

    /// Called once per scanned directory when its scan completes, with
    /// the final accumulated child count. Pruned, excluded and
    /// device-skipped directories are never reported. The default does
    /// nothing; statistics collectors override it.
    fn visit_dir_done(&self, _path: &str, _num_entries: i64) {}
}

/// Immutable per-walk configuration.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Stat every entry (the expression or long output needs metadata).
    pub needs_stat: bool,

    /// Use `stat` rather than `lstat` for entries.
    pub follow_symlinks: bool,

    /// Children fetched per scanner call.
    pub scan_size: usize,

    /// Maximum descent depth for the depth-first walker; -1 = unlimited.
    pub max_depth: i64,

    /// Ceiling on concurrently scanned directories.
    pub concurrent_scans: usize,

    /// Ceiling on concurrent stat calls within one batch.
    pub concurrent_stats: usize,

    /// Batch size below which stat calls stay sequential.
    pub async_threshold: usize,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            needs_stat: false,
            follow_symlinks: false,
            scan_size: 100,
            max_depth: -1,
            concurrent_scans: 1000,
            concurrent_stats: 1000,
            async_threshold: 10,
        }
    }
}

/// What the prefix step decided about a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Prefix {
    Descend,
    Skip,
}

/// The per-directory pipeline shared by both walkers.
///
/// Owns every collaborator of a walk; the walkers themselves only add
/// scheduling.
pub struct WalkCore {
    fs: Arc<dyn FileSystem>,
    expr: Arc<Expression>,
    batcher: StatBatcher,
    exclusions: Exclusions,
    same_device: Option<SameDevice>,
    visitor: Arc<dyn Visitor>,
    config: WalkerConfig,
}

impl WalkCore {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        expr: Arc<Expression>,
        batcher: StatBatcher,
        exclusions: Exclusions,
        same_device: Option<SameDevice>,
        visitor: Arc<dyn Visitor>,
        config: WalkerConfig,
    ) -> Self {
        Self {
            fs,
            expr,
            batcher,
            exclusions,
            same_device,
            visitor,
            config,
        }
    }

    pub(crate) fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    pub(crate) fn config(&self) -> &WalkerConfig {
        &self.config
    }

    pub(crate) fn visitor(&self) -> &dyn Visitor {
        self.visitor.as_ref()
    }

    /// Stat the start path; failures here are fatal configuration errors.
    pub(crate) fn root_info(&self, ctx: &CancelToken, path: &str) -> Result<FileInfo> {
        let res = if self.config.follow_symlinks {
            self.fs.stat(ctx, path)
        } else {
            self.fs.lstat(ctx, path)
        };
        res.map_err(|e| {
            if e.is_cancelled() {
                e
            } else {
                ConfigError::StartPath {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
                .into()
            }
        })
    }

    /// Whether `path` stays on the start device. Errors other than
    /// cancellation are reported through the visitor and answered with
    /// `false`.
    fn device_allowed(&self, ctx: &CancelToken, path: &str, info: &FileInfo) -> Result<bool> {
        let Some(sd) = &self.same_device else {
            return Ok(true);
        };
        match sd.matches(ctx, self.fs.as_ref(), path, info) {
            Ok(allowed) => Ok(allowed),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                self.visitor.visit(path, "", None, None, Some(&e));
                Ok(false)
            }
        }
    }

    /// Prefix step for a directory about to be scanned: exclusions, the
    /// device boundary, and prune-on-match. The predicate result here has
    /// no effect on emission (the parent's listing already handled that);
    /// its only observable effect is pruning.
    pub(crate) fn check_prefix(
        &self,
        ctx: &CancelToken,
        path: &str,
        info: &FileInfo,
    ) -> Result<Prefix> {
        if self.exclusions.is_match(path) {
            return Ok(Prefix::Skip);
        }
        if !self.device_allowed(ctx, path, info)? {
            return Ok(Prefix::Skip);
        }
        // Pruning on a child-count operand is a no-op: the count is only
        // known after the descent pruning would skip.
        if self.expr.prune() && !self.expr.needs_num_entries() {
            let view = AttrView::stat(self.fs.as_ref(), ctx, path, info, 0);
            if self.expr.eval(&view) {
                return Ok(Prefix::Skip);
            }
        }
        Ok(Prefix::Descend)
    }

    /// Content step for one scan batch: evaluate, emit, and hand each
    /// descendable subdirectory to `on_dir` in batch order. `num_entries`
    /// is the containing directory's accumulated child count including
    /// this batch. The only error is cancellation.
    pub(crate) fn handle_contents(
        &self,
        ctx: &CancelToken,
        parent: &str,
        batch: &[Entry],
        num_entries: i64,
        on_dir: &mut dyn FnMut(String, FileInfo) -> Result<()>,
    ) -> Result<()> {
        if self.config.needs_stat {
            self.contents_with_stat(ctx, parent, batch, num_entries, on_dir)
        } else {
            self.contents_without_stat(ctx, parent, batch, num_entries, on_dir)
        }
    }

    fn contents_with_stat(
        &self,
        ctx: &CancelToken,
        parent: &str,
        batch: &[Entry],
        num_entries: i64,
        on_dir: &mut dyn FnMut(String, FileInfo) -> Result<()>,
    ) -> Result<()> {
        let (_, all) = self.batcher.process(ctx, parent, batch)?;
        for info in all {
            let path = self.fs.join(parent, info.name());
            if info.is_dir() && !self.device_allowed(ctx, &path, &info)? {
                continue;
            }
            let view = AttrView::stat(self.fs.as_ref(), ctx, &path, &info, num_entries);
            if self.expr.eval(&view) {
                let entry = Entry {
                    name: info.name().to_string(),
                    file_type: info.file_type(),
                };
                self.visitor
                    .visit(parent, info.name(), Some(&entry), Some(&info), None);
            }
            if info.is_dir() {
                on_dir(path, info)?;
            }
        }
        Ok(())
    }

    fn contents_without_stat(
        &self,
        ctx: &CancelToken,
        parent: &str,
        batch: &[Entry],
        num_entries: i64,
        on_dir: &mut dyn FnMut(String, FileInfo) -> Result<()>,
    ) -> Result<()> {
        // Only directories need metadata here: the walker has to know
        // where to recurse (and which device each child is on).
        let dirs: Vec<Entry> = batch.iter().filter(|e| e.is_dir()).cloned().collect();
        let (dir_infos, _) = self.batcher.process(ctx, parent, &dirs)?;
        let mut by_name: HashMap<String, FileInfo> = dir_infos
            .into_iter()
            .map(|i| (i.name().to_string(), i))
            .collect();

        for e in batch {
            let path = self.fs.join(parent, &e.name);
            if e.is_dir() {
                // Absent info means the stat failed and was already
                // reported by the batcher.
                let Some(info) = by_name.remove(&e.name) else {
                    continue;
                };
                if !self.device_allowed(ctx, &path, &info)? {
                    continue;
                }
                let view = AttrView::entry(&e.name, &path, e.file_type, num_entries);
                if self.expr.eval(&view) {
                    self.visitor.visit(parent, &e.name, Some(e), None, None);
                }
                on_dir(path, info)?;
            } else {
                let view = AttrView::entry(&e.name, &path, e.file_type, num_entries);
                if self.expr.eval(&view) {
                    self.visitor.visit(parent, &e.name, Some(e), None, None);
                }
            }
        }
        Ok(())
    }
}
