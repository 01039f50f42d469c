//! Cancellation token shared by walkers and filesystem drivers.
//!
//! A single token is created per walk and cloned into every collaborator.
//! Filesystem calls, the stat batcher and both walkers observe it; once
//! tripped, in-flight operations finish and everything downstream returns
//! [`UfindError::Cancelled`].

use crate::error::{Result, UfindError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation handle over a shared atomic flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, untripped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. Idempotent; safe to call from a signal handler thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether the token has been tripped.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Return `Err(Cancelled)` once the token has been tripped.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(UfindError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_trips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        token.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(UfindError::Cancelled)));

        // Idempotent.
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
