//! Thin dispatch from options to a running walk.
//!
//! `locate` assembles the collaborators (expression, exclusions,
//! same-device policy, stat batcher) around a caller-supplied filesystem
//! and visitor, then routes the walk to the concurrent or depth-first
//! walker. This is the library entry point the CLI and the test suite
//! both go through.

use crate::cancel::CancelToken;
use crate::error::{ConfigError, Result};
use crate::expr::standard_parser;
use crate::fs::FileSystem;
use crate::ids::IdManager;
use crate::walk::{
    ConcurrentWalker, DepthFirstWalker, Exclusions, SameDevice, StatBatcher, StatMode, Visitor,
    WalkCore, WalkerConfig,
};
use std::sync::Arc;

/// Per-invocation options; defaults mirror the CLI defaults.
#[derive(Debug, Clone)]
pub struct LocateOptions {
    /// Ceiling on concurrently scanned directories.
    pub concurrent_scans: usize,

    /// Children fetched per scanner call.
    pub scan_size: usize,

    /// Ceiling on concurrent stat calls.
    pub concurrent_stats: usize,

    /// Batch size at which stat calls go parallel.
    pub async_threshold: usize,

    /// Regex patterns for directories to skip.
    pub exclude: Vec<String>,

    /// Confine the walk to the start path's device.
    pub same_device: bool,

    /// Stop descending into a directory once it matches.
    pub prune: bool,

    /// Follow symbolic links (stat instead of lstat).
    pub follow_symlinks: bool,

    /// Long output: forces stat metadata for every entry.
    pub long: bool,

    /// Use the ordered depth-first walker.
    pub sorted: bool,

    /// Maximum descent depth for the depth-first walker; -1 = unlimited.
    pub max_depth: i64,
}

impl Default for LocateOptions {
    fn default() -> Self {
        Self {
            concurrent_scans: 1000,
            scan_size: 100,
            concurrent_stats: 1000,
            async_threshold: 10,
            exclude: Vec::new(),
            same_device: true,
            prune: false,
            follow_symlinks: false,
            long: false,
            sorted: false,
            max_depth: -1,
        }
    }
}

/// Walk `start`, applying the expression in `expr_args` (joined with
/// spaces), and deliver every match and per-entry error to `visitor`.
///
/// Fatal errors (bad expression, bad exclude pattern, unreachable start
/// path, cancellation) are returned; everything else flows through the
/// visitor and the walk completes successfully.
pub fn locate(
    ctx: &CancelToken,
    fs: Arc<dyn FileSystem>,
    ids: Arc<IdManager>,
    opts: &LocateOptions,
    visitor: Arc<dyn Visitor>,
    start: &str,
    expr_args: &[String],
) -> Result<()> {
    let exclusions = Exclusions::new(&opts.exclude)?;
    let expr = standard_parser(ids).parse_args(expr_args, opts.prune)?;
    let same_device = if opts.same_device {
        let sd = SameDevice::new(ctx, fs.as_ref(), start).map_err(|e| {
            if e.is_cancelled() {
                e
            } else {
                ConfigError::StartPath {
                    path: start.to_string(),
                    reason: e.to_string(),
                }
                .into()
            }
        })?;
        Some(sd)
    } else {
        None
    };

    let needs_stat = expr.needs_stat() || opts.long;
    let mode = if opts.follow_symlinks {
        StatMode::Stat
    } else {
        StatMode::Lstat
    };
    let batcher = StatBatcher::new(
        fs.clone(),
        visitor.clone(),
        opts.concurrent_stats,
        opts.async_threshold,
        mode,
    );
    let config = WalkerConfig {
        needs_stat,
        follow_symlinks: opts.follow_symlinks,
        scan_size: opts.scan_size,
        max_depth: opts.max_depth,
        concurrent_scans: opts.concurrent_scans,
        concurrent_stats: opts.concurrent_stats,
        async_threshold: opts.async_threshold,
    };
    let core = WalkCore::new(
        fs,
        Arc::new(expr),
        batcher,
        exclusions,
        same_device,
        visitor,
        config,
    );

    if opts.sorted {
        DepthFirstWalker::new(core).walk(ctx, start)
    } else {
        ConcurrentWalker::new(core).walk(ctx, start)
    }
}
