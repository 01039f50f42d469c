//! Printing visitor for the CLI.
//!
//! Matches go to stdout, one path per line; `-l` adds mode bits, a human
//! size, the modification time and the resolved owner. Per-entry errors
//! go to stderr as `path: error`. `println!` locks stdout per line, which
//! is all the synchronization concurrent emission needs.

use crate::cancel::CancelToken;
use crate::error::UfindError;
use crate::fs::{Entry, FileInfo, FileSystem, FileType, XAttr};
use crate::ids::IdManager;
use crate::walk::Visitor;
use chrono::{DateTime, Local};
use humansize::{format_size, BINARY};
use std::sync::Arc;

/// Prints walk results in short or long form.
pub struct PrintVisitor {
    fs: Arc<dyn FileSystem>,
    ctx: CancelToken,
    ids: Arc<IdManager>,
    long: bool,
}

impl PrintVisitor {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        ctx: CancelToken,
        ids: Arc<IdManager>,
        long: bool,
    ) -> Self {
        Self { fs, ctx, ids, long }
    }
}

impl Visitor for PrintVisitor {
    fn visit(
        &self,
        parent: &str,
        name: &str,
        _entry: Option<&Entry>,
        info: Option<&FileInfo>,
        err: Option<&UfindError>,
    ) {
        let path = self.fs.join(parent, name);
        if let Some(err) = err {
            eprintln!("{path}: {err}");
            return;
        }
        let Some(info) = info.filter(|_| self.long) else {
            println!("{path}");
            return;
        };

        let attrs = match self.fs.xattr(&self.ctx, &path, info) {
            Ok(attrs) => attrs,
            Err(e) => {
                eprintln!("{path}: {e}");
                XAttr::default()
            }
        };
        let user = self
            .ids
            .user_name(attrs.uid)
            .unwrap_or_else(|| attrs.uid.to_string());
        let group = self
            .ids
            .group_name(attrs.gid)
            .unwrap_or_else(|| attrs.gid.to_string());
        let mtime: DateTime<Local> = info.modified().into();
        println!(
            "{path}: {} {} {} ({user}, {group})",
            mode_string(info.file_type(), info.mode()),
            format_size(info.size(), BINARY),
            mtime.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

/// Classic `ls -l` style mode rendering.
pub fn mode_string(file_type: FileType, mode: u32) -> String {
    let kind = match file_type {
        FileType::Dir => 'd',
        FileType::Symlink => 'l',
        FileType::File => '-',
        FileType::Other => '?',
    };
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
