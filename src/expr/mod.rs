//! Boolean predicate engine over file metadata
//!
//! Expressions combine operands (`name=`, `re=`, `type=`, ...) with `||`,
//! `&&`, `!` and parentheses. A parsed [`Expression`] is immutable and
//! answers three questions: does a given attribute view match, does any
//! operand require stat metadata, and does any operand require the
//! containing directory's child count. Walkers use the last two to avoid
//! stat calls the expression never looks at.
//!
//! The operand set lives in a registry on [`Parser`], so callers can wire
//! in operands that need process-wide services (`user=`/`group=` take the
//! id manager) without this module knowing about them.

mod operands;
mod parser;

pub use operands::standard_parser;

use crate::cancel::CancelToken;
use crate::error::ExprError;
use crate::fs::{FileInfo, FileSystem, FileType, XAttr};
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

/// The attribute bundle handed to operands during evaluation.
///
/// An *entry view* carries only what a directory listing exposes; a *stat
/// view* additionally carries [`FileInfo`] and can fetch extended
/// attributes lazily through the filesystem. Both carry the containing
/// directory's accumulated child count.
pub struct AttrView<'a> {
    name: &'a str,
    path: &'a str,
    file_type: FileType,
    info: Option<&'a FileInfo>,
    num_entries: i64,
    fetch: Option<(&'a dyn FileSystem, &'a CancelToken)>,
}

impl<'a> AttrView<'a> {
    /// View of a bare directory entry; no stat has been performed.
    pub fn entry(name: &'a str, path: &'a str, file_type: FileType, num_entries: i64) -> Self {
        Self {
            name,
            path,
            file_type,
            info: None,
            num_entries,
            fetch: None,
        }
    }

    /// View of a stat'd entry. `fs` and `ctx` serve lazy xattr fetches
    /// by the owner-matching operands.
    pub fn stat(
        fs: &'a dyn FileSystem,
        ctx: &'a CancelToken,
        path: &'a str,
        info: &'a FileInfo,
        num_entries: i64,
    ) -> Self {
        Self {
            name: info.name(),
            path,
            file_type: info.file_type(),
            info: Some(info),
            num_entries,
            fetch: Some((fs, ctx)),
        }
    }

    /// Leaf name within the containing directory.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Full path of the entry.
    pub fn path(&self) -> &str {
        self.path
    }

    /// Type bits (available on both view kinds).
    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    /// Accumulated child count of the containing directory.
    pub fn num_entries(&self) -> i64 {
        self.num_entries
    }

    /// Size in bytes; `None` on entry views.
    pub fn size(&self) -> Option<u64> {
        self.info.map(|i| i.size())
    }

    /// Full mode bits; `None` on entry views.
    pub fn mode(&self) -> Option<u32> {
        self.info.map(|i| i.mode())
    }

    /// Modification time; `None` on entry views.
    pub fn modified(&self) -> Option<SystemTime> {
        self.info.map(|i| i.modified())
    }

    /// Extended attributes, fetched through the filesystem on demand.
    /// `None` on entry views or when the fetch fails.
    pub fn xattr(&self) -> Option<XAttr> {
        let (fs, ctx) = self.fetch?;
        let info = self.info?;
        fs.xattr(ctx, self.path, info).ok()
    }
}

/// A single predicate leaf. Implementations declare which view
/// capabilities they consume; `!` never inverts a declaration.
pub trait Operand: Send + Sync + fmt::Debug {
    /// Evaluate against a view. Operands asking for absent metadata
    /// (e.g. size on an entry view) must answer `false`, not panic.
    fn eval(&self, view: &AttrView<'_>) -> bool;

    /// Whether evaluation reads stat metadata (size, mode, mtime, xattr).
    fn needs_stat(&self) -> bool {
        false
    }

    /// Whether evaluation reads the directory child count.
    fn needs_num_entries(&self) -> bool {
        false
    }
}

/// Parsed expression tree.
#[derive(Debug)]
pub(crate) enum Node {
    Or(Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Leaf(Box<dyn Operand>),
}

impl Node {
    fn eval(&self, view: &AttrView<'_>) -> bool {
        match self {
            Node::Or(l, r) => l.eval(view) || r.eval(view),
            Node::And(l, r) => l.eval(view) && r.eval(view),
            Node::Not(n) => !n.eval(view),
            Node::Leaf(op) => op.eval(view),
        }
    }

    fn any(&self, pred: &dyn Fn(&dyn Operand) -> bool) -> bool {
        match self {
            Node::Or(l, r) | Node::And(l, r) => l.any(pred) || r.any(pred),
            Node::Not(n) => n.any(pred),
            Node::Leaf(op) => pred(op.as_ref()),
        }
    }
}

/// Immutable boolean expression plus the static prune flag.
///
/// An empty expression matches every view and requires no metadata.
#[derive(Debug)]
pub struct Expression {
    root: Option<Node>,
    prune: bool,
}

impl Expression {
    /// The empty expression.
    pub fn empty() -> Self {
        Self {
            root: None,
            prune: false,
        }
    }

    /// True when no operands were supplied.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Evaluate the expression against a view.
    pub fn eval(&self, view: &AttrView<'_>) -> bool {
        match &self.root {
            Some(node) => node.eval(view),
            None => true,
        }
    }

    /// Whether any live operand requires stat metadata.
    pub fn needs_stat(&self) -> bool {
        self.root
            .as_ref()
            .is_some_and(|n| n.any(&|op| op.needs_stat()))
    }

    /// Whether any live operand requires directory child counts.
    pub fn needs_num_entries(&self) -> bool {
        self.root
            .as_ref()
            .is_some_and(|n| n.any(&|op| op.needs_num_entries()))
    }

    /// Whether a matching directory should have its subtree skipped.
    pub fn prune(&self) -> bool {
        self.prune
    }
}

type Factory = Box<dyn Fn(&str) -> Result<Box<dyn Operand>, String> + Send + Sync>;

struct OperandSpec {
    doc: &'static str,
    factory: Factory,
}

/// Operand registry and expression parser.
pub struct Parser {
    ops: BTreeMap<&'static str, OperandSpec>,
}

impl Parser {
    /// An empty registry. Most callers want [`standard_parser`].
    pub fn new() -> Self {
        Self {
            ops: BTreeMap::new(),
        }
    }

    /// Register an operand. `factory` receives the unquoted value and
    /// returns the operand or a reason string for the parse error.
    pub fn register(
        &mut self,
        name: &'static str,
        doc: &'static str,
        factory: impl Fn(&str) -> Result<Box<dyn Operand>, String> + Send + Sync + 'static,
    ) {
        self.ops.insert(
            name,
            OperandSpec {
                doc,
                factory: Box::new(factory),
            },
        );
    }

    /// One documentation line per registered operand, in name order.
    pub fn operand_docs(&self) -> Vec<&'static str> {
        self.ops.values().map(|spec| spec.doc).collect()
    }

    pub(crate) fn make_operand(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Box<dyn Operand>, ExprError> {
        let spec = self
            .ops
            .get(name)
            .ok_or_else(|| ExprError::UnknownOperand(name.to_string()))?;
        (spec.factory)(value).map_err(|reason| ExprError::InvalidValue {
            operand: name.to_string(),
            value: value.to_string(),
            reason,
        })
    }

    /// Parse `input` into an expression with the given prune flag.
    /// Whitespace-only input yields the empty expression; prune without
    /// operands would skip every directory, so it is dropped there.
    pub fn parse(&self, input: &str, prune: bool) -> Result<Expression, ExprError> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Expression {
                root: None,
                prune: false,
            });
        }
        let root = parser::parse(self, input)?;
        Ok(Expression {
            root: Some(root),
            prune,
        })
    }

    /// Parse an expression spread across CLI arguments, which are joined
    /// with spaces first.
    pub fn parse_args(&self, args: &[String], prune: bool) -> Result<Expression, ExprError> {
        self.parse(&args.join(" "), prune)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("operands", &self.ops.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdManager;

    fn expr(input: &str) -> Expression {
        standard_parser(IdManager::new()).parse(input, false).unwrap()
    }

    fn entry_view<'a>(name: &'a str, path: &'a str, ft: FileType) -> AttrView<'a> {
        AttrView::entry(name, path, ft, 0)
    }

    #[test]
    fn test_empty_expression_matches_everything() {
        let e = expr("   ");
        assert!(e.is_empty());
        assert!(e.eval(&entry_view("x", "a/x", FileType::File)));
        assert!(!e.needs_stat());
        assert!(!e.needs_num_entries());
    }

    #[test]
    fn test_needs_stat_propagation() {
        assert!(!expr("re=.go").needs_stat());
        assert!(!expr("re=.go || type=f").needs_stat());
        assert!(expr("re=.go || newer=2010-12-13").needs_stat());
        assert!(!expr("type=f").needs_stat());
        assert!(expr("type=x").needs_stat());

        let e = expr("file-larger=10");
        assert!(e.needs_stat());
        assert!(!e.needs_num_entries());

        let e = expr("dir-larger=100");
        assert!(e.needs_num_entries());
        assert!(!e.needs_stat());

        // Negation inverts the match, not the metadata requirement.
        assert!(expr("!newer=2010-12-13").needs_stat());
    }

    #[test]
    fn test_boolean_combinations() {
        let e = expr("name=a || name=b");
        assert!(e.eval(&entry_view("a", "r/a", FileType::File)));
        assert!(e.eval(&entry_view("b", "r/b", FileType::File)));
        assert!(!e.eval(&entry_view("c", "r/c", FileType::File)));

        let e = expr("name=a && type=d");
        assert!(e.eval(&entry_view("a", "r/a", FileType::Dir)));
        assert!(!e.eval(&entry_view("a", "r/a", FileType::File)));

        let e = expr("!(name=a || name=b)");
        assert!(!e.eval(&entry_view("a", "r/a", FileType::File)));
        assert!(e.eval(&entry_view("c", "r/c", FileType::File)));
    }

    #[test]
    fn test_precedence_and_over_or() {
        // a || b && c parses as a || (b && c)
        let e = expr("name=a || name=b && type=d");
        assert!(e.eval(&entry_view("a", "r/a", FileType::File)));
        assert!(!e.eval(&entry_view("b", "r/b", FileType::File)));
        assert!(e.eval(&entry_view("b", "r/b", FileType::Dir)));
    }

    #[test]
    fn test_unknown_operand_is_an_error() {
        let parser = standard_parser(IdManager::new());
        assert!(matches!(
            parser.parse("frobnicate=1", false),
            Err(ExprError::UnknownOperand(_))
        ));
    }
}
