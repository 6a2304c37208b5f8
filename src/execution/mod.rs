//! Execution hardening: cooperative cancellation.
//!
//! ## Design
//!
//! Long-running operations (index population, unbounded traversals, bulk
//! imports) poll a shared atomic flag and abort at the next batch
//! boundary; the batch size bounds the reaction latency. Timeouts are
//! enforced by the enclosing query operator, which arms the same token —
//! the core itself never blocks on a timer and must not hold locks when
//! yielding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Entries processed between cancellation polls.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Raised when a cancelled or expired token is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    /// How long the operation ran before the check fired
    pub elapsed: Duration,
}

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation cancelled after {:?}", self.elapsed)
    }
}

impl std::error::Error for Cancelled {}

/// Shared cooperative-cancellation token.
///
/// Cloneable and thread-safe; the host arms it, workers poll it.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    started: Instant,
    deadline: Option<Duration>,
}

impl CancelToken {
    pub fn new(deadline: Option<Duration>) -> Self {
        CancelToken {
            cancelled: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
            deadline,
        }
    }

    /// A token that only cancels explicitly.
    pub fn infinite() -> Self {
        CancelToken::new(None)
    }

    /// Request cancellation; takes effect at the next poll.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Poll the token. Call once per batch, not per entry.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(Cancelled {
                elapsed: self.started.elapsed(),
            });
        }
        if let Some(deadline) = self.deadline {
            let elapsed = self.started.elapsed();
            if elapsed > deadline {
                self.cancelled.store(true, Ordering::Relaxed);
                return Err(Cancelled { elapsed });
            }
        }
        Ok(())
    }

    /// Poll every `batch_size` iterations: returns `Err` only when `i`
    /// lands on a batch boundary and the token has tripped.
    pub fn check_batch(&self, i: usize, batch_size: usize) -> Result<(), Cancelled> {
        if i % batch_size.max(1) == 0 {
            self.check()
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_cancellation() {
        let token = CancelToken::infinite();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(token.check().is_err());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_deadline_trips_once_elapsed() {
        let token = CancelToken::new(Some(Duration::ZERO));
        std::thread::sleep(Duration::from_millis(2));
        assert!(token.check().is_err());
    }

    #[test]
    fn test_batch_polling_skips_mid_batch() {
        let token = CancelToken::infinite();
        token.cancel();
        assert!(token.check_batch(1, 100).is_ok());
        assert!(token.check_batch(100, 100).is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::infinite();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
