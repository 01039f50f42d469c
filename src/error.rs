//! Error types for ufind
//!
//! Three families of failures flow through the crate:
//! - configuration errors (bad flags, bad exclude patterns, unreachable
//!   start path) abort before or at walk start;
//! - expression errors are reported when the predicate is parsed;
//! - per-entry I/O errors are delivered to the visitor and never abort
//!   the walk. Cancellation is the only error a running walk returns.

use thiserror::Error;

/// Top-level error type for the ufind application.
#[derive(Error, Debug)]
pub enum UfindError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Expression parse errors
    #[error("invalid expression: {0}")]
    Expr(#[from] ExprError),

    /// I/O errors from filesystem operations
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Worker/concurrency errors
    #[error("worker error: {0}")]
    Worker(#[from] WorkerError),

    /// The walk was cancelled via its token
    #[error("operation cancelled")]
    Cancelled,
}

impl UfindError {
    /// True for the cancellation error, which walkers treat specially:
    /// it is returned from the top-level walk rather than reported
    /// through the visitor.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UfindError::Cancelled)
    }
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid exclude pattern
    #[error("invalid exclude pattern '{pattern}': {reason}")]
    InvalidExcludePattern { pattern: String, reason: String },

    /// A numeric flag was given a value outside its accepted range
    #[error("invalid value {value} for {flag}: {reason}")]
    InvalidFlag {
        flag: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The start path could not be examined
    #[error("cannot walk '{path}': {reason}")]
    StartPath { path: String, reason: String },
}

/// Expression parse errors
#[derive(Error, Debug)]
pub enum ExprError {
    /// Input ended where an operand or subexpression was expected
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// A token appeared where it is not allowed
    #[error("unexpected '{0}' in expression")]
    UnexpectedToken(String),

    /// A '(' without matching ')'
    #[error("missing closing parenthesis")]
    UnbalancedParen,

    /// A quoted operand value without a closing quote
    #[error("unterminated quote in '{0}'")]
    UnterminatedQuote(String),

    /// Operand name not present in the registry
    #[error("unknown operand '{0}'")]
    UnknownOperand(String),

    /// An operand token without '=value'
    #[error("operand '{0}' is missing a value")]
    MissingValue(String),

    /// The operand's value failed to compile or resolve
    #[error("invalid value '{value}' for '{operand}': {reason}")]
    InvalidValue {
        operand: String,
        value: String,
        reason: String,
    },
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker thread could not be started
    #[error("failed to start walker thread {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// Worker panicked
    #[error("walker thread {id} panicked")]
    Panicked { id: usize },

    /// The work queue disconnected while workers were still running
    #[error("work queue disconnected unexpectedly")]
    QueueDisconnected,
}

/// Result type alias for UfindError
pub type Result<T> = std::result::Result<T, UfindError>;
