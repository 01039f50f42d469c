//! ufind - Ultra Fast Parallel Find
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;
use ufind::cancel::CancelToken;
use ufind::config::{CliArgs, Command, LocateArgs};
use ufind::expr::standard_parser;
use ufind::fs::{FileSystem, LocalFs};
use ufind::ids::IdManager;
use ufind::output::PrintVisitor;
use ufind::stats::WalkStats;
use ufind::walk::Visitor;
use ufind::UfindError;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging()?;

    match args.command {
        Command::Locate(lc) => run_locate(lc),
        Command::ExpressionSyntax => {
            print!("{}", expression_syntax_help());
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable; RUST_LOG selects
/// the level, silent by default.
fn setup_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}

fn run_locate(args: LocateArgs) -> Result<()> {
    let opts = args.to_options().context("invalid configuration")?;

    let ctx = CancelToken::new();
    {
        let ctx = ctx.clone();
        ctrlc::set_handler(move || ctx.cancel()).context("failed to set signal handler")?;
    }

    let fs: Arc<dyn FileSystem> = Arc::new(LocalFs::new());
    let ids = IdManager::new();
    let printer: Arc<dyn Visitor> = Arc::new(PrintVisitor::new(
        fs.clone(),
        ctx.clone(),
        ids.clone(),
        opts.long,
    ));

    let stats = args
        .stats
        .then(|| Arc::new(WalkStats::new(printer.clone(), fs.clone(), args.top)));
    let visitor: Arc<dyn Visitor> = match &stats {
        Some(stats) => stats.clone(),
        None => printer,
    };

    let result = ufind::locate(
        &ctx,
        fs,
        ids,
        &opts,
        visitor,
        &args.directory,
        &args.expression,
    );

    if let Some(stats) = &stats {
        // Summarize what was seen even on a cancelled walk.
        stats
            .write_summary(&mut std::io::stderr())
            .context("failed to write statistics")?;
    }

    match result {
        Ok(()) => Ok(()),
        Err(UfindError::Cancelled) => Err(anyhow::anyhow!("interrupted")),
        Err(e) => Err(e).context(format!("walking '{}'", args.directory)),
    }
}

fn expression_syntax_help() -> String {
    let parser = standard_parser(IdManager::new());
    let mut out = String::new();
    out.push_str(
        "ufind accepts boolean expressions using ||, &&, ! and ( ) to combine\n\
         any of the following operands:\n\n",
    );
    for doc in parser.operand_docs() {
        out.push_str("  ");
        out.push_str(doc);
        out.push_str("\n\n");
    }
    out.push_str(
        "The name operand evaluates both the name of a file or directory within\n\
         the directory that contains it and its full path name. The re (regexp)\n\
         operand evaluates the full path name only.\n\n\
         For example 'name=bar' will match a file named 'bar' in directory\n\
         '/foo', as will 'name=/foo/bar'. Since name uses glob matching, all\n\
         directory levels must be specified: 'name=/*/*/baz' is required to\n\
         match /foo/bar/baz. The re operand matches at any level, so 're=bar'\n\
         will match '/foo/bar/baz', as will 're=bar/baz'.\n\n\
         The dir-larger and dir-smaller operands compare against a directory's\n\
         child count as it accumulates during the scan, so entries encountered\n\
         before the threshold is crossed may not be displayed.\n\n\
         The expression may span multiple arguments, which are concatenated\n\
         with spaces. Operand values may be quoted with single quotes or use\n\
         backslash escapes: re='a b.pdf' or re=a\\ b.pdf\n",
    );
    out
}
