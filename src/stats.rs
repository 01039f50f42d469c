//! Walk statistics
//!
//! A visitor decorator that counts what flows past it: totals for files,
//! directories, symlinks, bytes and errors, the top-N largest files when
//! size metadata is present, and the top-N most-populated directories
//! from the per-directory completion callback. Sizes are only
//! accumulated when the walk already stats entries; enabling statistics
//! never forces extra stat calls.

use crate::error::UfindError;
use crate::fs::{Entry, FileInfo, FileSystem, FileType};
use crate::walk::Visitor;
use humansize::{format_size, BINARY};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Default)]
struct StatsState {
    files: u64,
    dirs: u64,
    symlinks: u64,
    bytes: u64,
    errors: u64,
    // Min-heaps: the smallest of the current top-N sits on top and is
    // evicted first.
    largest: BinaryHeap<Reverse<(u64, String)>>,
    fullest: BinaryHeap<Reverse<(i64, String)>>,
}

/// Counts emissions while forwarding them to an inner visitor.
pub struct WalkStats {
    inner: Arc<dyn Visitor>,
    fs: Arc<dyn FileSystem>,
    top_n: usize,
    state: Mutex<StatsState>,
}

impl WalkStats {
    pub fn new(inner: Arc<dyn Visitor>, fs: Arc<dyn FileSystem>, top_n: usize) -> Self {
        Self {
            inner,
            fs,
            top_n,
            state: Mutex::new(StatsState::default()),
        }
    }

    /// Write the accumulated summary, largest files last.
    pub fn write_summary(&self, out: &mut dyn Write) -> io::Result<()> {
        let state = self.state.lock();
        writeln!(out, "files       : {}", state.files)?;
        writeln!(out, "directories : {}", state.dirs)?;
        writeln!(out, "symlinks    : {}", state.symlinks)?;
        writeln!(out, "errors      : {}", state.errors)?;
        if state.bytes > 0 {
            writeln!(
                out,
                "total size  : {} ({} bytes)",
                format_size(state.bytes, BINARY),
                state.bytes
            )?;
        }
        if !state.largest.is_empty() {
            writeln!(out, "largest {} files:", state.largest.len())?;
            let mut entries: Vec<_> = state.largest.iter().map(|r| &r.0).collect();
            entries.sort_by(|a, b| b.cmp(a));
            for (size, path) in entries {
                writeln!(out, "  {}: {}", path, format_size(*size, BINARY))?;
            }
        }
        if !state.fullest.is_empty() {
            writeln!(out, "most-populated {} directories:", state.fullest.len())?;
            let mut entries: Vec<_> = state.fullest.iter().map(|r| &r.0).collect();
            entries.sort_by(|a, b| b.cmp(a));
            for (count, path) in entries {
                writeln!(out, "  {path}: {count} entries")?;
            }
        }
        Ok(())
    }
}

impl Visitor for WalkStats {
    fn visit(
        &self,
        parent: &str,
        name: &str,
        entry: Option<&Entry>,
        info: Option<&FileInfo>,
        err: Option<&UfindError>,
    ) {
        self.inner.visit(parent, name, entry, info, err);

        let mut state = self.state.lock();
        if err.is_some() {
            state.errors += 1;
            return;
        }
        let Some(entry) = entry else { return };
        match entry.file_type {
            FileType::Dir => state.dirs += 1,
            FileType::Symlink => state.symlinks += 1,
            _ => state.files += 1,
        }
        if let Some(info) = info {
            if entry.file_type == FileType::File {
                state.bytes += info.size();
                if self.top_n > 0 {
                    let path = self.fs.join(parent, name);
                    state.largest.push(Reverse((info.size(), path)));
                    if state.largest.len() > self.top_n {
                        state.largest.pop();
                    }
                }
            }
        }
    }

    fn visit_dir_done(&self, path: &str, num_entries: i64) {
        self.inner.visit_dir_done(path, num_entries);
        if self.top_n == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.fullest.push(Reverse((num_entries, path.to_string())));
        if state.fullest.len() > self.top_n {
            state.fullest.pop();
        }
    }
}
