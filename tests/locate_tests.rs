//! End-to-end tests of the locate dispatch over the local filesystem.

use parking_lot::Mutex;
use std::fs;
use std::os::unix::fs::symlink;
use std::sync::Arc;
use tempfile::TempDir;
use ufind::cancel::CancelToken;
use ufind::error::UfindError;
use ufind::fs::{Entry, FileInfo, LocalFs};
use ufind::ids::IdManager;
use ufind::walk::Visitor;
use ufind::{locate, LocateOptions};

/// Collects `(parent, name)` pairs, with parents made relative to the
/// tree root so expectations are stable across temp directories.
struct Collector {
    root: String,
    found: Mutex<Vec<(String, String)>>,
    errors: Mutex<Vec<(String, String)>>,
}

impl Collector {
    fn new(root: &str) -> Self {
        Self {
            root: root.to_string(),
            found: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }
}

impl Visitor for Collector {
    fn visit(
        &self,
        parent: &str,
        name: &str,
        _entry: Option<&Entry>,
        _info: Option<&FileInfo>,
        err: Option<&UfindError>,
    ) {
        let parent = parent
            .strip_prefix(&self.root)
            .unwrap_or(parent)
            .to_string();
        if err.is_some() {
            self.errors.lock().push((parent, name.to_string()));
        } else {
            self.found.lock().push((parent, name.to_string()));
        }
    }
}

type Found = Vec<(String, String)>;

fn run(tree: &TempDir, opts: &LocateOptions, expr: &str) -> (Found, Found) {
    let root = tree.path().to_str().unwrap().to_string();
    let collector = Arc::new(Collector::new(&root));
    let ctx = CancelToken::new();
    locate(
        &ctx,
        Arc::new(LocalFs::new()),
        IdManager::new(),
        opts,
        collector.clone(),
        &root,
        &[expr.to_string()],
    )
    .unwrap();
    let mut found = collector.found.lock().clone();
    let mut errors = collector.errors.lock().clone();
    found.sort();
    errors.sort();
    (found, errors)
}

fn pairs(list: &[(&str, &str)]) -> Found {
    let mut out: Found = list
        .iter()
        .map(|(p, n)| (p.to_string(), n.to_string()))
        .collect();
    out.sort();
    out
}

/// Three 4-byte files per directory, three symlinks at the top.
///
/// ```text
/// f0 f1 f2  la0->a0  la1->a0/a0.1  lf0->f0
/// a0/{f0 f1 f2, a0.0/{f0 f1 f2}, a0.1/{f0 f1 f2}}
/// b0/{b0.0/{f0 f1 f2}, b0.1/b1.0/{f0 f1 f2}}
/// ```
fn create_test_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path();
    for d in ["a0/a0.0", "a0/a0.1", "b0/b0.0", "b0/b0.1/b1.0"] {
        fs::create_dir_all(p.join(d)).unwrap();
    }
    for d in ["", "a0", "a0/a0.0", "a0/a0.1", "b0/b0.0", "b0/b0.1/b1.0"] {
        for f in ["f0", "f1", "f2"] {
            fs::write(p.join(d).join(f), "xxxx").unwrap();
        }
    }
    symlink("a0", p.join("la0")).unwrap();
    symlink("a0/a0.1", p.join("la1")).unwrap();
    symlink("f0", p.join("lf0")).unwrap();
    dir
}

fn all() -> Found {
    pairs(&[
        ("", "a0"),
        ("", "b0"),
        ("", "f0"),
        ("", "f1"),
        ("", "f2"),
        ("", "la0"),
        ("", "la1"),
        ("", "lf0"),
        ("/a0", "a0.0"),
        ("/a0", "a0.1"),
        ("/a0", "f0"),
        ("/a0", "f1"),
        ("/a0", "f2"),
        ("/a0/a0.0", "f0"),
        ("/a0/a0.0", "f1"),
        ("/a0/a0.0", "f2"),
        ("/a0/a0.1", "f0"),
        ("/a0/a0.1", "f1"),
        ("/a0/a0.1", "f2"),
        ("/b0", "b0.0"),
        ("/b0", "b0.1"),
        ("/b0/b0.0", "f0"),
        ("/b0/b0.0", "f1"),
        ("/b0/b0.0", "f2"),
        ("/b0/b0.1", "b1.0"),
        ("/b0/b0.1/b1.0", "f0"),
        ("/b0/b0.1/b1.0", "f1"),
        ("/b0/b0.1/b1.0", "f2"),
    ])
}

fn all_files() -> Found {
    all()
        .into_iter()
        .filter(|(_, n)| n.starts_with('f'))
        .collect()
}

fn all_dirs() -> Found {
    pairs(&[
        ("", "a0"),
        ("", "b0"),
        ("/a0", "a0.0"),
        ("/a0", "a0.1"),
        ("/b0", "b0.0"),
        ("/b0", "b0.1"),
        ("/b0/b0.1", "b1.0"),
    ])
}

#[test]
fn test_completeness_with_empty_expression() {
    let tree = create_test_tree();
    for sorted in [false, true] {
        let opts = LocateOptions {
            sorted,
            ..Default::default()
        };
        let (found, errors) = run(&tree, &opts, "");
        assert_eq!(found, all(), "sorted={sorted}");
        assert!(errors.is_empty(), "sorted={sorted}");
    }
}

#[test]
fn test_idempotence_across_runs() {
    let tree = create_test_tree();
    let opts = LocateOptions::default();
    let (first, _) = run(&tree, &opts, "type=f");
    let (second, _) = run(&tree, &opts, "type=f");
    assert_eq!(first, second);
}

#[test]
fn test_regex_operand() {
    let tree = create_test_tree();
    let opts = LocateOptions::default();

    let (found, _) = run(&tree, &opts, "re=a0$ || re=b0.1$");
    assert_eq!(found, pairs(&[("", "a0"), ("", "la0"), ("/b0", "b0.1")]));

    // type=x needs stat but nothing here is executable.
    let (found, _) = run(&tree, &opts, "re=a0$ || re=b0.1$ || type=x");
    assert_eq!(found, pairs(&[("", "a0"), ("", "la0"), ("/b0", "b0.1")]));

    let (found, _) = run(&tree, &opts, "re=a0/a0.1");
    assert_eq!(
        found,
        pairs(&[
            ("/a0", "a0.1"),
            ("/a0/a0.1", "f0"),
            ("/a0/a0.1", "f1"),
            ("/a0/a0.1", "f2"),
        ])
    );
}

#[test]
fn test_name_glob_operand() {
    let tree = create_test_tree();
    let opts = LocateOptions::default();
    let (found, _) = run(&tree, &opts, "name=f0");
    assert_eq!(
        found,
        pairs(&[
            ("", "f0"),
            ("/a0", "f0"),
            ("/a0/a0.0", "f0"),
            ("/a0/a0.1", "f0"),
            ("/b0/b0.0", "f0"),
            ("/b0/b0.1/b1.0", "f0"),
        ])
    );

    let (found, _) = run(&tree, &opts, "name=*.0");
    assert_eq!(
        found,
        pairs(&[("/a0", "a0.0"), ("/b0", "b0.0"), ("/b0/b0.1", "b1.0")])
    );
}

#[test]
fn test_type_operands() {
    let tree = create_test_tree();
    let opts = LocateOptions::default();

    let (found, _) = run(&tree, &opts, "type=f");
    assert_eq!(found, all_files());

    let (found, _) = run(&tree, &opts, "type=d");
    assert_eq!(found, all_dirs());

    let (found, _) = run(&tree, &opts, "type=l");
    assert_eq!(found, pairs(&[("", "la0"), ("", "la1"), ("", "lf0")]));
}

#[test]
fn test_prune() {
    let tree = create_test_tree();
    let opts = LocateOptions {
        prune: true,
        ..Default::default()
    };

    // Prune without an expression walks everything.
    let (found, _) = run(&tree, &opts, "");
    assert_eq!(found, all());

    // A matching directory is emitted but not descended into.
    let (found, _) = run(&tree, &opts, "name=a0");
    assert_eq!(found, pairs(&[("", "a0")]));

    let (found, _) = run(&tree, &opts, "name=a0.1");
    assert_eq!(found, pairs(&[("/a0", "a0.1")]));

    // Symlink matches never prune a directory.
    let (found, _) = run(&tree, &opts, "type=l");
    assert_eq!(found, pairs(&[("", "la0"), ("", "la1"), ("", "lf0")]));
}

#[test]
fn test_stat_operands() {
    let tree = create_test_tree();
    let opts = LocateOptions::default();

    let (found, _) = run(&tree, &opts, "newer=2010-12-13");
    assert_eq!(found, all());

    let (found, _) = run(&tree, &opts, "newer=2050-12-13");
    assert!(found.is_empty());

    // Every file is exactly four bytes.
    let (found, _) = run(&tree, &opts, "file-larger=3");
    assert_eq!(found, all_files());

    let (found, _) = run(&tree, &opts, "file-larger=4");
    assert!(found.is_empty());

    let (found, _) = run(&tree, &opts, "file-smaller=5");
    assert_eq!(found, all_files());

    let (found, _) = run(&tree, &opts, "file-smaller=4");
    assert!(found.is_empty());
}

#[test]
fn test_dir_larger() {
    let tree = create_test_tree();
    let opts = LocateOptions::default();

    // b1.0 is the only child of b0.1, so its containing count never
    // exceeds one.
    let mut expected = all_dirs();
    expected.retain(|(p, n)| !(p == "/b0/b0.1" && n == "b1.0"));

    let (found, _) = run(&tree, &opts, "dir-larger=1");
    assert_eq!(found, expected);

    // Prune has no effect on child-count operands.
    let pruned = LocateOptions {
        prune: true,
        ..Default::default()
    };
    let (found, _) = run(&tree, &pruned, "dir-larger=1");
    assert_eq!(found, expected);

    let (found, _) = run(&tree, &opts, "dir-larger=100");
    assert!(found.is_empty());
}

#[test]
fn test_multi_argument_expression() {
    let tree = create_test_tree();
    let root = tree.path().to_str().unwrap().to_string();
    let collector = Arc::new(Collector::new(&root));
    let ctx = CancelToken::new();
    let args: Vec<String> = ["type=d", "||", "type=l"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    locate(
        &ctx,
        Arc::new(LocalFs::new()),
        IdManager::new(),
        &LocateOptions::default(),
        collector.clone(),
        &root,
        &args,
    )
    .unwrap();
    let mut found = collector.found.lock().clone();
    found.sort();
    let mut expected = all_dirs();
    expected.extend(pairs(&[("", "la0"), ("", "la1"), ("", "lf0")]));
    expected.sort();
    assert_eq!(found, expected);
}

#[test]
fn test_invalid_expression_is_fatal() {
    let tree = create_test_tree();
    let root = tree.path().to_str().unwrap().to_string();
    let collector = Arc::new(Collector::new(&root));
    let ctx = CancelToken::new();
    let err = locate(
        &ctx,
        Arc::new(LocalFs::new()),
        IdManager::new(),
        &LocateOptions::default(),
        collector,
        &root,
        &["frobnicate=1".to_string()],
    )
    .unwrap_err();
    assert!(matches!(err, UfindError::Expr(_)));
}

#[test]
fn test_unreachable_start_path_is_fatal() {
    let collector = Arc::new(Collector::new(""));
    let ctx = CancelToken::new();
    let err = locate(
        &ctx,
        Arc::new(LocalFs::new()),
        IdManager::new(),
        &LocateOptions::default(),
        collector,
        "/definitely/not/a/real/path",
        &[],
    )
    .unwrap_err();
    assert!(matches!(err, UfindError::Config(_)));
}

#[test]
fn test_cancelled_before_start() {
    let tree = create_test_tree();
    let root = tree.path().to_str().unwrap().to_string();
    let collector = Arc::new(Collector::new(&root));
    let ctx = CancelToken::new();
    ctx.cancel();
    let err = locate(
        &ctx,
        Arc::new(LocalFs::new()),
        IdManager::new(),
        &LocateOptions::default(),
        collector,
        &root,
        &[],
    )
    .unwrap_err();
    assert!(err.is_cancelled());
}

#[test]
fn test_unreadable_directory_reports_error_and_continues() {
    // Permission bits do not bind root; skip there.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }
    use std::os::unix::fs::PermissionsExt;

    let tree = create_test_tree();
    let locked = tree.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let (found, errors) = run(&tree, &LocateOptions::default(), "");
    let mut expected = all();
    expected.push(("".to_string(), "locked".to_string()));
    expected.sort();
    assert_eq!(found, expected);
    assert_eq!(errors, pairs(&[("/locked", "")]));

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
}
