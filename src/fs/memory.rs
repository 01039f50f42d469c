//! In-memory filesystem driver
//!
//! A deterministic tree assembled through a builder. Enumeration order is
//! insertion order, devices and owners are settable per node, and stat,
//! scan-open and xattr failures can be injected, which makes this the
//! workhorse of the walker test suite. It is also the smallest possible
//! worked example of the [`FileSystem`] contract for anyone adding a real
//! remote backend.

use super::{Entry, FileInfo, FileSystem, FileType, LevelScanner, XAttr};
use crate::cancel::CancelToken;
use crate::error::{Result, UfindError};
use std::collections::HashMap;
use std::io;
use std::time::{Duration, SystemTime};

const DEFAULT_DIR_MODE: u32 = 0o040_755;
const DEFAULT_FILE_MODE: u32 = 0o100_644;
const DEFAULT_LINK_MODE: u32 = 0o120_777;

fn default_mtime() -> SystemTime {
    // 2020-09-13, fixed so unit tests comparing against dates are stable.
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000)
}

/// One materialized node of a [`MemFs`] tree.
#[derive(Debug, Clone)]
struct MemNode {
    file_type: FileType,
    size: u64,
    mode: u32,
    modified: SystemTime,
    attrs: XAttr,
    children: Vec<Entry>,
    fail_stat: bool,
    fail_open: bool,
    fail_xattr: bool,
}

/// Immutable in-memory filesystem keyed by full path.
#[derive(Debug, Clone)]
pub struct MemFs {
    nodes: HashMap<String, MemNode>,
}

impl MemFs {
    /// Start building a tree rooted at `root`.
    pub fn builder(root: &str) -> MemFsBuilder {
        MemFsBuilder {
            root: NodeBuilder::new(root, FileType::Dir),
        }
    }

    fn node(&self, path: &str) -> io::Result<&MemNode> {
        self.nodes
            .get(path)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{path}: not found")))
    }
}

impl FileSystem for MemFs {
    fn stat(&self, ctx: &CancelToken, path: &str) -> Result<FileInfo> {
        // Symlink targets are not modeled, so stat and lstat agree.
        self.lstat(ctx, path)
    }

    fn lstat(&self, ctx: &CancelToken, path: &str) -> Result<FileInfo> {
        ctx.check()?;
        let node = self.node(path)?;
        if node.fail_stat {
            return Err(
                io::Error::new(io::ErrorKind::PermissionDenied, format!("{path}: stat denied"))
                    .into(),
            );
        }
        Ok(FileInfo::new(
            self.base(path),
            node.file_type,
            node.mode,
            node.size,
            node.modified,
            node.attrs,
        ))
    }

    fn xattr(&self, ctx: &CancelToken, path: &str, info: &FileInfo) -> Result<XAttr> {
        ctx.check()?;
        match self.nodes.get(path) {
            Some(node) if node.fail_xattr => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{path}: attributes denied"),
            )
            .into()),
            Some(node) => Ok(node.attrs),
            None => Ok(info.sys()),
        }
    }

    fn join(&self, parent: &str, name: &str) -> String {
        if parent.is_empty() {
            return name.to_string();
        }
        if name.is_empty() {
            return parent.to_string();
        }
        format!("{parent}/{name}")
    }

    fn base(&self, path: &str) -> String {
        path.rsplit('/').next().unwrap_or(path).to_string()
    }

    fn level_scanner(&self, path: &str) -> Box<dyn LevelScanner> {
        let opened = match self.node(path) {
            Ok(node) if node.fail_open => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{path}: permission denied"),
            )),
            Ok(node) if !node.file_type.is_dir() => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{path}: not a directory"),
            )),
            Ok(node) => Ok(node.children.clone()),
            Err(e) => Err(e),
        };
        Box::new(MemScanner {
            opened: Some(opened),
            entries: Vec::new(),
            pos: 0,
            batch: Vec::new(),
            err: None,
        })
    }
}

struct MemScanner {
    opened: Option<io::Result<Vec<Entry>>>,
    entries: Vec<Entry>,
    pos: usize,
    batch: Vec<Entry>,
    err: Option<UfindError>,
}

impl LevelScanner for MemScanner {
    fn scan(&mut self, ctx: &CancelToken, max: usize) -> bool {
        if ctx.is_cancelled() {
            self.err = Some(UfindError::Cancelled);
            return false;
        }
        if let Some(opened) = self.opened.take() {
            match opened {
                Ok(entries) => self.entries = entries,
                Err(e) => {
                    self.err = Some(e.into());
                    return false;
                }
            }
        }
        if self.pos >= self.entries.len() {
            return false;
        }
        let end = (self.pos + max.max(1)).min(self.entries.len());
        self.batch = self.entries[self.pos..end].to_vec();
        self.pos = end;
        true
    }

    fn contents(&mut self) -> Vec<Entry> {
        std::mem::take(&mut self.batch)
    }

    fn take_err(&mut self) -> Option<UfindError> {
        self.err.take()
    }
}

/// Builder for one node and, recursively, its children.
#[derive(Debug)]
pub struct NodeBuilder {
    name: String,
    file_type: FileType,
    size: u64,
    mode: Option<u32>,
    modified: SystemTime,
    device: Option<u64>,
    uid: u32,
    gid: u32,
    fail_stat: bool,
    fail_open: bool,
    fail_xattr: bool,
    children: Vec<NodeBuilder>,
}

impl NodeBuilder {
    fn new(name: &str, file_type: FileType) -> Self {
        Self {
            name: name.to_string(),
            file_type,
            size: 0,
            mode: None,
            modified: default_mtime(),
            device: None,
            uid: 0,
            gid: 0,
            fail_stat: false,
            fail_open: false,
            fail_xattr: false,
            children: Vec::new(),
        }
    }

    /// Add a regular file; returns the child for attribute chaining.
    pub fn file(&mut self, name: &str) -> &mut NodeBuilder {
        self.children.push(NodeBuilder::new(name, FileType::File));
        self.children.last_mut().unwrap()
    }

    /// Add a subdirectory populated by `f`; returns the child.
    pub fn dir(&mut self, name: &str, f: impl FnOnce(&mut NodeBuilder)) -> &mut NodeBuilder {
        let mut child = NodeBuilder::new(name, FileType::Dir);
        f(&mut child);
        self.children.push(child);
        self.children.last_mut().unwrap()
    }

    /// Add a symbolic link.
    pub fn symlink(&mut self, name: &str) -> &mut NodeBuilder {
        self.children.push(NodeBuilder::new(name, FileType::Symlink));
        self.children.last_mut().unwrap()
    }

    /// Set the size in bytes.
    pub fn size(&mut self, size: u64) -> &mut Self {
        self.size = size;
        self
    }

    /// Set the full mode bits (overrides the per-type default).
    pub fn mode(&mut self, mode: u32) -> &mut Self {
        self.mode = Some(mode);
        self
    }

    /// Set the modification time.
    pub fn modified(&mut self, t: SystemTime) -> &mut Self {
        self.modified = t;
        self
    }

    /// Place this node (and, by inheritance, its subtree) on `device`.
    pub fn device(&mut self, device: u64) -> &mut Self {
        self.device = Some(device);
        self
    }

    /// Set the owning uid/gid.
    pub fn owner(&mut self, uid: u32, gid: u32) -> &mut Self {
        self.uid = uid;
        self.gid = gid;
        self
    }

    /// Make directory scans of this node fail with permission denied.
    pub fn unreadable(&mut self) -> &mut Self {
        self.fail_open = true;
        self
    }

    /// Make stat/lstat of this node fail with permission denied.
    pub fn unstattable(&mut self) -> &mut Self {
        self.fail_stat = true;
        self
    }

    /// Make xattr reads of this node fail.
    pub fn xattr_error(&mut self) -> &mut Self {
        self.fail_xattr = true;
        self
    }
}

/// Builder for a whole [`MemFs`] tree.
#[derive(Debug)]
pub struct MemFsBuilder {
    root: NodeBuilder,
}

impl MemFsBuilder {
    /// Device id of the root (children inherit unless overridden).
    pub fn device(mut self, device: u64) -> Self {
        self.root.device = Some(device);
        self
    }

    /// Populate the root directory.
    pub fn populate(mut self, f: impl FnOnce(&mut NodeBuilder)) -> Self {
        f(&mut self.root);
        self
    }

    /// Materialize the tree.
    pub fn build(self) -> MemFs {
        let mut nodes = HashMap::new();
        let mut next_file_id = 1u64;
        let root_path = self.root.name.clone();
        flatten(&self.root, &root_path, 1, &mut nodes, &mut next_file_id);
        MemFs { nodes }
    }
}

fn flatten(
    nb: &NodeBuilder,
    path: &str,
    inherited_device: u64,
    nodes: &mut HashMap<String, MemNode>,
    next_file_id: &mut u64,
) {
    let device = nb.device.unwrap_or(inherited_device);
    let mode = nb.mode.unwrap_or(match nb.file_type {
        FileType::Dir => DEFAULT_DIR_MODE,
        FileType::Symlink => DEFAULT_LINK_MODE,
        _ => DEFAULT_FILE_MODE,
    });
    let file_id = *next_file_id;
    *next_file_id += 1;
    let children = nb
        .children
        .iter()
        .map(|c| Entry {
            name: c.name.clone(),
            file_type: c.file_type,
        })
        .collect();
    nodes.insert(
        path.to_string(),
        MemNode {
            file_type: nb.file_type,
            size: nb.size,
            mode,
            modified: nb.modified,
            attrs: XAttr {
                device,
                uid: nb.uid,
                gid: nb.gid,
                file_id,
            },
            children,
            fail_stat: nb.fail_stat,
            fail_open: nb.fail_open,
            fail_xattr: nb.fail_xattr,
        },
    );
    for child in &nb.children {
        let child_path = format!("{path}/{}", child.name);
        flatten(child, &child_path, device, nodes, next_file_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemFs {
        MemFs::builder("root")
            .device(30)
            .populate(|d| {
                d.file("a").size(3);
                d.dir("b", |d| {
                    d.file("c");
                    d.file("d");
                });
                d.file("e");
            })
            .build()
    }

    #[test]
    fn test_scan_preserves_insertion_order() {
        let fs = sample();
        let ctx = CancelToken::new();
        let mut sc = fs.level_scanner("root");
        let mut names = Vec::new();
        while sc.scan(&ctx, 2) {
            names.extend(sc.contents().into_iter().map(|e| e.name));
        }
        assert!(sc.take_err().is_none());
        assert_eq!(names, ["a", "b", "e"]);
    }

    #[test]
    fn test_stat_and_xattr() {
        let fs = sample();
        let ctx = CancelToken::new();
        let info = fs.lstat(&ctx, "root/a").unwrap();
        assert_eq!(info.name(), "a");
        assert_eq!(info.size(), 3);
        assert!(info.file_type().is_file());
        let attrs = fs.xattr(&ctx, "root/a", &info).unwrap();
        assert_eq!(attrs.device, 30);
    }

    #[test]
    fn test_device_inheritance_and_override() {
        let fs = MemFs::builder("r")
            .device(30)
            .populate(|d| {
                d.file("f0");
                d.dir("mnt", |d| {
                    d.file("f3");
                })
                .device(40);
            })
            .build();
        let ctx = CancelToken::new();
        let f0 = fs.lstat(&ctx, "r/f0").unwrap();
        assert_eq!(fs.xattr(&ctx, "r/f0", &f0).unwrap().device, 30);
        let mnt = fs.lstat(&ctx, "r/mnt").unwrap();
        assert_eq!(fs.xattr(&ctx, "r/mnt", &mnt).unwrap().device, 40);
        let f3 = fs.lstat(&ctx, "r/mnt/f3").unwrap();
        assert_eq!(fs.xattr(&ctx, "r/mnt/f3", &f3).unwrap().device, 40);
    }

    #[test]
    fn test_fault_injection() {
        let fs = MemFs::builder("root")
            .populate(|d| {
                d.dir("x", |_| {}).unreadable();
                d.file("y").unstattable();
            })
            .build();
        let ctx = CancelToken::new();

        let mut sc = fs.level_scanner("root/x");
        assert!(!sc.scan(&ctx, 10));
        assert!(sc.take_err().is_some());

        assert!(fs.lstat(&ctx, "root/y").is_err());
        // The listing itself still shows both entries.
        let mut sc = fs.level_scanner("root");
        assert!(sc.scan(&ctx, 10));
        assert_eq!(sc.contents().len(), 2);
    }

    #[test]
    fn test_scanner_on_missing_and_non_dir() {
        let fs = sample();
        let ctx = CancelToken::new();
        let mut sc = fs.level_scanner("root/nope");
        assert!(!sc.scan(&ctx, 10));
        assert!(sc.take_err().is_some());

        let mut sc = fs.level_scanner("root/a");
        assert!(!sc.scan(&ctx, 10));
        assert!(sc.take_err().is_some());
    }
}
