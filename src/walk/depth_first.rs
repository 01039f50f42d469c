//! Depth-first walker
//!
//! Single-threaded ordered traversal: every directory's descendants are
//! emitted before any later sibling of that directory, with siblings in
//! the scanner's native order. The walker does not sort; a caller
//! wanting alphabetical output brings a sorting scanner.
//!
//! Depth counts levels below the start path (start = 0); descent into a
//! directory deeper than `max_depth` is skipped, -1 means unlimited.

use super::{Prefix, WalkCore};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::fs::{Entry, FileInfo};
use tracing::debug;

/// Ordered single-threaded traversal.
pub struct DepthFirstWalker {
    core: WalkCore,
}

impl DepthFirstWalker {
    pub fn new(core: WalkCore) -> Self {
        Self { core }
    }

    /// Walk `start` in depth-first order. A non-directory start path is
    /// emitted as-is without predicate filtering.
    pub fn walk(&self, ctx: &CancelToken, start: &str) -> Result<()> {
        let info = self.core.root_info(ctx, start)?;
        if !info.is_dir() {
            let entry = Entry {
                name: self.core.fs().base(start),
                file_type: info.file_type(),
            };
            self.core
                .visitor()
                .visit(start, "", Some(&entry), Some(&info), None);
            return Ok(());
        }
        debug!(start, "starting depth-first walk");
        self.handle_dir(ctx, start, 0, &info)
    }

    fn handle_dir(&self, ctx: &CancelToken, path: &str, depth: i64, info: &FileInfo) -> Result<()> {
        let max_depth = self.core.config().max_depth;
        if max_depth >= 0 && depth > max_depth {
            return Ok(());
        }
        match self.core.check_prefix(ctx, path, info)? {
            Prefix::Descend => {}
            Prefix::Skip => return Ok(()),
        }

        let mut sc = self.core.fs().level_scanner(path);
        let mut num_entries = 0i64;
        while sc.scan(ctx, self.core.config().scan_size) {
            let batch = sc.contents();
            num_entries += batch.len() as i64;
            self.core
                .handle_contents(ctx, path, &batch, num_entries, &mut |child_path, child_info| {
                    self.handle_dir(ctx, &child_path, depth + 1, &child_info)
                })?;
        }
        if let Some(err) = sc.take_err() {
            if err.is_cancelled() {
                return Err(err);
            }
            self.core.visitor().visit(path, "", None, None, Some(&err));
        }
        self.core.visitor().visit_dir_done(path, num_entries);
        Ok(())
    }
}
