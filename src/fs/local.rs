//! Local-disk filesystem driver
//!
//! Built on `std::fs`. Directory scanning keeps the `ReadDir` handle open
//! between batches so one pass over a huge directory never materializes
//! the whole listing; entry types come from `DirEntry::file_type`, which
//! on the common platforms is served from the dirent itself.

use super::{Entry, FileInfo, FileSystem, FileType, LevelScanner, XAttr};
use crate::cancel::CancelToken;
use crate::error::{Result, UfindError};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::SystemTime;

/// The local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }

    fn info_from_metadata(path: &str, md: &fs::Metadata) -> FileInfo {
        let name = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let sys = XAttr {
            device: md.dev(),
            uid: md.uid(),
            gid: md.gid(),
            file_id: md.ino(),
        };
        FileInfo::new(
            name,
            FileType::from(md.file_type()),
            md.mode(),
            md.len(),
            md.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            sys,
        )
    }
}

impl FileSystem for LocalFs {
    fn stat(&self, ctx: &CancelToken, path: &str) -> Result<FileInfo> {
        ctx.check()?;
        let md = fs::metadata(path)?;
        Ok(Self::info_from_metadata(path, &md))
    }

    fn lstat(&self, ctx: &CancelToken, path: &str) -> Result<FileInfo> {
        ctx.check()?;
        let md = fs::symlink_metadata(path)?;
        Ok(Self::info_from_metadata(path, &md))
    }

    fn xattr(&self, ctx: &CancelToken, _path: &str, info: &FileInfo) -> Result<XAttr> {
        ctx.check()?;
        Ok(info.sys())
    }

    fn join(&self, parent: &str, name: &str) -> String {
        if parent.is_empty() {
            return name.to_string();
        }
        if name.is_empty() {
            return parent.to_string();
        }
        Path::new(parent).join(name).to_string_lossy().into_owned()
    }

    fn base(&self, path: &str) -> String {
        Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    }

    fn level_scanner(&self, path: &str) -> Box<dyn LevelScanner> {
        Box::new(LocalScanner {
            path: path.to_string(),
            iter: None,
            batch: Vec::new(),
            err: None,
            done: false,
        })
    }
}

/// Chunked scanner over one local directory.
struct LocalScanner {
    path: String,
    iter: Option<fs::ReadDir>,
    batch: Vec<Entry>,
    err: Option<UfindError>,
    done: bool,
}

impl LevelScanner for LocalScanner {
    fn scan(&mut self, ctx: &CancelToken, max: usize) -> bool {
        if self.done {
            return false;
        }
        if ctx.is_cancelled() {
            self.err = Some(UfindError::Cancelled);
            self.done = true;
            return false;
        }
        if self.iter.is_none() {
            match fs::read_dir(&self.path) {
                Ok(rd) => self.iter = Some(rd),
                Err(e) => {
                    self.err = Some(e.into());
                    self.done = true;
                    return false;
                }
            }
        }
        let iter = self.iter.as_mut().unwrap();
        self.batch.clear();
        while self.batch.len() < max.max(1) {
            match iter.next() {
                Some(Ok(de)) => {
                    let file_type = de
                        .file_type()
                        .map(FileType::from)
                        .unwrap_or(FileType::Other);
                    self.batch.push(Entry {
                        name: de.file_name().to_string_lossy().into_owned(),
                        file_type,
                    });
                }
                Some(Err(e)) => {
                    // Surface the partial batch now; the error is returned
                    // on the next call.
                    self.err = Some(e.into());
                    self.done = true;
                    return !self.batch.is_empty();
                }
                None => {
                    self.done = true;
                    return !self.batch.is_empty();
                }
            }
        }
        true
    }

    fn contents(&mut self) -> Vec<Entry> {
        std::mem::take(&mut self.batch)
    }

    fn take_err(&mut self) -> Option<UfindError> {
        self.err.take()
    }
}
