//! Configuration types for ufind
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Validation of the numeric flags into [`LocateOptions`]

use crate::error::ConfigError;
use crate::locate::LocateOptions;
use clap::{ArgAction, Args, Parser, Subcommand};

/// Ultra fast, parallel find
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ufind",
    version,
    about = "Ultra fast, parallel find command",
    long_about = "Walks a directory tree in parallel, emitting every entry that satisfies a\n\
                  boolean expression over file and directory attributes.\n\n\
                  Expressions combine operands such as name=, re=, type=, newer= and\n\
                  file-larger= with ||, && and ! (see the expression-syntax command).",
    after_help = "EXAMPLES:\n    \
        ufind locate /data 'name=*.log'\n    \
        ufind locate /data \"re=cache && newer=2024-01-01\"\n    \
        ufind locate --sorted --depth 2 /data type=d\n    \
        ufind locate --exclude '\\.snapshot' --prune /data name=build\n    \
        ufind expression-syntax"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Locate files using boolean expressions
    Locate(LocateArgs),

    /// Show help on the expression syntax and matching operands
    ExpressionSyntax,
}

/// Arguments to the locate subcommand.
#[derive(Args, Debug, Clone)]
pub struct LocateArgs {
    /// The directory to start the search from
    #[arg(value_name = "DIRECTORY")]
    pub directory: String,

    /// The expression to match files against (arguments are joined with
    /// spaces; quote operators to keep the shell out of the way)
    #[arg(value_name = "EXPRESSION")]
    pub expression: Vec<String>,

    /// Number of concurrent directory scans
    #[arg(long, default_value_t = 1000, value_name = "NUM")]
    pub concurrent_dir_scans: usize,

    /// Size of directory scan batches
    #[arg(long, default_value_t = 100, value_name = "NUM")]
    pub dir_scan_size: usize,

    /// Max number of concurrent stat system calls
    #[arg(long, default_value_t = 1000, value_name = "NUM")]
    pub async_stats_total: usize,

    /// Threshold at which to start issuing concurrent stat calls
    #[arg(long, default_value_t = 10, value_name = "NUM")]
    pub async_stats_threshold: usize,

    /// Exclude directories matching the regexp pattern (repeatable)
    #[arg(long = "exclude", value_name = "PATTERN", action = ArgAction::Append)]
    pub exclude: Vec<String>,

    /// Only search directories on the same device as the starting directory
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub same_device: bool,

    /// Stop the search below a directory once it matches
    #[arg(long)]
    pub prune: bool,

    /// Follow softlinks
    #[arg(long)]
    pub follow_softlinks: bool,

    /// Show detailed information about each match
    #[arg(short = 'l')]
    pub long: bool,

    /// Output in sorted, depth-first order, like the find command
    #[arg(long)]
    pub sorted: bool,

    /// Maximum descent depth, -1 for unlimited (depth-first walker only)
    #[arg(long, default_value_t = -1, value_name = "NUM", allow_hyphen_values = true)]
    pub depth: i64,

    /// Display statistics about the walk on stderr
    #[arg(long)]
    pub stats: bool,

    /// Number of largest files to track for --stats
    #[arg(long, default_value_t = 50, value_name = "NUM")]
    pub top: usize,
}

impl LocateArgs {
    /// Validate the numeric flags and produce walk options.
    pub fn to_options(&self) -> Result<LocateOptions, ConfigError> {
        fn positive(flag: &'static str, value: usize) -> Result<usize, ConfigError> {
            if value == 0 {
                return Err(ConfigError::InvalidFlag {
                    flag,
                    value: value.to_string(),
                    reason: "must be at least 1",
                });
            }
            Ok(value)
        }

        if self.depth < -1 {
            return Err(ConfigError::InvalidFlag {
                flag: "depth",
                value: self.depth.to_string(),
                reason: "must be -1 (unlimited) or non-negative",
            });
        }

        Ok(LocateOptions {
            concurrent_scans: positive("concurrent-dir-scans", self.concurrent_dir_scans)?,
            scan_size: positive("dir-scan-size", self.dir_scan_size)?,
            concurrent_stats: positive("async-stats-total", self.async_stats_total)?,
            async_threshold: positive("async-stats-threshold", self.async_stats_threshold)?,
            exclude: self.exclude.clone(),
            same_device: self.same_device,
            prune: self.prune,
            follow_symlinks: self.follow_softlinks,
            long: self.long,
            sorted: self.sorted,
            max_depth: self.depth,
        })
    }
}
