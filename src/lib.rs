//! ufind - Ultra Fast Parallel Find
//!
//! A parallel, expression-driven file-finder: given a starting directory
//! and a boolean predicate over file and directory attributes, every
//! filesystem entry satisfying the predicate is emitted. Designed as a
//! faster, more expressive replacement for classical `find`.
//!
//! # Features
//!
//! - **Parallel traversal**: directory scans are scheduled concurrently
//!   over a worker pool; stat calls within a directory fan out with a
//!   bounded ceiling.
//!
//! - **Expression matching**: operands over names, paths, types, sizes,
//!   times and owners combine with `||`, `&&`, `!` and parentheses. The
//!   expression reports which metadata it needs, so entries are only
//!   stat'd when an operand will look at the result.
//!
//! - **Pluggable filesystems**: walkers talk to a [`fs::FileSystem`]
//!   trait; local disk and an in-memory tree ship in-crate, remote
//!   backends implement the same contract.
//!
//! - **Ordered mode**: a single-threaded depth-first walker emits
//!   entries in `find`-like order when output order matters more than
//!   throughput.
//!
//! # Architecture
//!
//! ```text
//!  CLI (locate / expression-syntax)
//!      │
//!      ▼
//!  locate() dispatch ──► Expression (predicate + capability probing)
//!      │                 Exclusions / SameDevice policies
//!      ▼
//!  ┌────────────────┐        ┌──────────────────┐
//!  │ Concurrent     │        │ DepthFirst       │
//!  │ walker         │   or   │ walker           │
//!  │ (work queue +  │        │ (ordered,        │
//!  │  worker pool)  │        │  single thread)  │
//!  └──────┬─────────┘        └────────┬─────────┘
//!         │     shared per-directory  │
//!         └──────────┬────────────────┘
//!                    ▼
//!          StatBatcher ──► FileSystem (local / memory / ...)
//!                    │
//!                    ▼
//!                Visitor (print, stats, collectors)
//! ```
//!
//! # Example
//!
//! ```bash
//! # Everything under /data modified this year
//! ufind locate /data newer=2026-01-01
//!
//! # Large logs, skipping snapshot directories
//! ufind locate --exclude '\.snapshot' /data 'name=*.log && file-larger=1000000'
//!
//! # Sorted, find-style listing of the top two levels
//! ufind locate --sorted --depth 2 /data
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod expr;
pub mod fs;
pub mod ids;
pub mod locate;
pub mod output;
pub mod stats;
pub mod walk;

pub use cancel::CancelToken;
pub use error::{Result, UfindError};
pub use locate::{locate, LocateOptions};
pub use walk::Visitor;
