//! The standard operand catalogue.
//!
//! Each operand declares the view capabilities it consumes; the glob and
//! regex operands work from the listing alone, the size/time/owner
//! operands require stat metadata, and the directory-count operands
//! require the accumulated child count. `name=` deliberately uses
//! per-level glob semantics: `*` does not cross path separators, so
//! matching deeper paths needs every level spelled out (`name=/*/*/baz`),
//! while `re=` matches anywhere in the full path.

use super::{AttrView, Operand, Parser};
use crate::ids::IdManager;
use chrono::NaiveDate;
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Build the parser with the full standard operand set. `user=` and
/// `group=` resolve names through the supplied id manager at parse time.
pub fn standard_parser(ids: Arc<IdManager>) -> Parser {
    let mut p = Parser::new();
    p.register(
        "name",
        "name=<glob> - matches the glob against the name of a file or directory as well as its full path",
        |v| Ok(Box::new(NameGlob::new("name", v, false)?)),
    );
    p.register(
        "iname",
        "iname=<glob> - case-insensitive form of the name operand",
        |v| Ok(Box::new(NameGlob::new("iname", v, true)?)),
    );
    p.register(
        "re",
        "re=<regexp> - matches the regular expression against the full path of a file or directory",
        |v| Ok(Box::new(PathRegex::new(v)?)),
    );
    p.register(
        "type",
        "type=f|d|l|x - matches regular files, directories, symbolic links or executable files",
        |v| Ok(Box::new(TypeIs::new(v)?)),
    );
    p.register(
        "newer",
        "newer=YYYY-MM-DD - matches files or directories modified after the date",
        |v| Ok(Box::new(NewerThan::new(v)?)),
    );
    p.register(
        "file-larger",
        "file-larger=<size> - matches files larger than the size in bytes",
        |v| Ok(Box::new(FileSize::new("file-larger", v, SizeCmp::Larger)?)),
    );
    p.register(
        "file-smaller",
        "file-smaller=<size> - matches files smaller than the size in bytes",
        |v| Ok(Box::new(FileSize::new("file-smaller", v, SizeCmp::Smaller)?)),
    );
    p.register(
        "dir-larger",
        "dir-larger=<count> - matches directories whose running child count exceeds the count; entries listed before the threshold is crossed may not match",
        |v| Ok(Box::new(DirCount::new("dir-larger", v, SizeCmp::Larger)?)),
    );
    p.register(
        "dir-smaller",
        "dir-smaller=<count> - matches directories whose running child count is below the count",
        |v| Ok(Box::new(DirCount::new("dir-smaller", v, SizeCmp::Smaller)?)),
    );
    {
        let ids = ids.clone();
        p.register(
            "user",
            "user=<name|uid> - matches files or directories owned by the user",
            move |v| Ok(Box::new(OwnerIs::user(v, &ids)?)),
        );
    }
    p.register(
        "group",
        "group=<name|gid> - matches files or directories owned by the group",
        move |v| Ok(Box::new(OwnerIs::group(v, &ids)?)),
    );
    p
}

struct NameGlob {
    op: &'static str,
    pattern: String,
    matcher: GlobMatcher,
}

impl NameGlob {
    fn new(op: &'static str, pattern: &str, case_insensitive: bool) -> Result<Self, String> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| e.kind().to_string())?;
        Ok(Self {
            op,
            pattern: pattern.to_string(),
            matcher: glob.compile_matcher(),
        })
    }
}

impl Operand for NameGlob {
    fn eval(&self, view: &AttrView<'_>) -> bool {
        self.matcher.is_match(view.name()) || self.matcher.is_match(view.path())
    }
}

impl fmt::Debug for NameGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.op, self.pattern)
    }
}

struct PathRegex {
    re: Regex,
}

impl PathRegex {
    fn new(pattern: &str) -> Result<Self, String> {
        let re = Regex::new(pattern).map_err(|e| e.to_string())?;
        Ok(Self { re })
    }
}

impl Operand for PathRegex {
    fn eval(&self, view: &AttrView<'_>) -> bool {
        self.re.is_match(view.path())
    }
}

impl fmt::Debug for PathRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "re={}", self.re.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeKind {
    File,
    Dir,
    Symlink,
    Executable,
}

struct TypeIs {
    kind: TypeKind,
}

impl TypeIs {
    fn new(value: &str) -> Result<Self, String> {
        let kind = match value {
            "f" => TypeKind::File,
            "d" => TypeKind::Dir,
            "l" => TypeKind::Symlink,
            "x" => TypeKind::Executable,
            _ => return Err("expected one of f, d, l, x".to_string()),
        };
        Ok(Self { kind })
    }
}

impl Operand for TypeIs {
    fn eval(&self, view: &AttrView<'_>) -> bool {
        match self.kind {
            TypeKind::File => view.file_type().is_file(),
            TypeKind::Dir => view.file_type().is_dir(),
            TypeKind::Symlink => view.file_type().is_symlink(),
            TypeKind::Executable => {
                view.file_type().is_file()
                    && view.mode().is_some_and(|m| m & 0o111 != 0)
            }
        }
    }

    fn needs_stat(&self) -> bool {
        // Only executability is a permission question; f/d/l come from
        // the listing's type bits.
        self.kind == TypeKind::Executable
    }
}

impl fmt::Debug for TypeIs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self.kind {
            TypeKind::File => 'f',
            TypeKind::Dir => 'd',
            TypeKind::Symlink => 'l',
            TypeKind::Executable => 'x',
        };
        write!(f, "type={c}")
    }
}

struct NewerThan {
    date: String,
    cutoff: SystemTime,
}

impl NewerThan {
    fn new(value: &str) -> Result<Self, String> {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| "expected YYYY-MM-DD".to_string())?;
        let ts = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc()
            .timestamp();
        let cutoff = if ts >= 0 {
            UNIX_EPOCH + Duration::from_secs(ts as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(ts.unsigned_abs())
        };
        Ok(Self {
            date: value.to_string(),
            cutoff,
        })
    }
}

impl Operand for NewerThan {
    fn eval(&self, view: &AttrView<'_>) -> bool {
        view.modified().is_some_and(|m| m > self.cutoff)
    }

    fn needs_stat(&self) -> bool {
        true
    }
}

impl fmt::Debug for NewerThan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "newer={}", self.date)
    }
}

#[derive(Debug, Clone, Copy)]
enum SizeCmp {
    Larger,
    Smaller,
}

struct FileSize {
    op: &'static str,
    limit: u64,
    cmp: SizeCmp,
}

impl FileSize {
    fn new(op: &'static str, value: &str, cmp: SizeCmp) -> Result<Self, String> {
        let limit = value
            .parse::<u64>()
            .map_err(|_| "expected a byte count".to_string())?;
        Ok(Self { op, limit, cmp })
    }
}

impl Operand for FileSize {
    fn eval(&self, view: &AttrView<'_>) -> bool {
        if !view.file_type().is_file() {
            return false;
        }
        view.size().is_some_and(|s| match self.cmp {
            SizeCmp::Larger => s > self.limit,
            SizeCmp::Smaller => s < self.limit,
        })
    }

    fn needs_stat(&self) -> bool {
        true
    }
}

impl fmt::Debug for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.op, self.limit)
    }
}

struct DirCount {
    op: &'static str,
    limit: i64,
    cmp: SizeCmp,
}

impl DirCount {
    fn new(op: &'static str, value: &str, cmp: SizeCmp) -> Result<Self, String> {
        let limit = value
            .parse::<i64>()
            .map_err(|_| "expected an entry count".to_string())?;
        Ok(Self { op, limit, cmp })
    }
}

impl Operand for DirCount {
    fn eval(&self, view: &AttrView<'_>) -> bool {
        view.file_type().is_dir()
            && match self.cmp {
                SizeCmp::Larger => view.num_entries() > self.limit,
                SizeCmp::Smaller => view.num_entries() < self.limit,
            }
    }

    fn needs_num_entries(&self) -> bool {
        true
    }
}

impl fmt::Debug for DirCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.op, self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    User,
    Group,
}

struct OwnerIs {
    which: Owner,
    spec: String,
    id: u32,
}

impl OwnerIs {
    fn user(value: &str, ids: &IdManager) -> Result<Self, String> {
        let id = ids
            .user_id(value)
            .ok_or_else(|| format!("unknown user '{value}'"))?;
        Ok(Self {
            which: Owner::User,
            spec: value.to_string(),
            id,
        })
    }

    fn group(value: &str, ids: &IdManager) -> Result<Self, String> {
        let id = ids
            .group_id(value)
            .ok_or_else(|| format!("unknown group '{value}'"))?;
        Ok(Self {
            which: Owner::Group,
            spec: value.to_string(),
            id,
        })
    }
}

impl Operand for OwnerIs {
    fn eval(&self, view: &AttrView<'_>) -> bool {
        view.xattr().is_some_and(|x| match self.which {
            Owner::User => x.uid == self.id,
            Owner::Group => x.gid == self.id,
        })
    }

    fn needs_stat(&self) -> bool {
        true
    }
}

impl fmt::Debug for OwnerIs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.which {
            Owner::User => write!(f, "user={}", self.spec),
            Owner::Group => write!(f, "group={}", self.spec),
        }
    }
}
