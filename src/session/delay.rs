//! Cancellable delay.
//!
//! A sleep that can be cut short. Cancelling is a normal completion, not an
//! error: the waiter learns which of the two happened from
//! [`DelayOutcome`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio_util::sync::CancellationToken;

// ============================================================================
// DelayOutcome
// ============================================================================

/// How a [`CancellableDelay`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayOutcome {
    /// The full duration passed.
    Elapsed,
    /// The delay was cancelled first.
    Cancelled,
}

// ============================================================================
// CancellableDelay
// ============================================================================

/// A sleep of fixed duration that completes early when cancelled.
#[derive(Debug, Clone)]
pub struct CancellableDelay {
    duration: Duration,
    token: CancellationToken,
}

impl CancellableDelay {
    /// Creates a delay cancelled through `token`.
    #[inline]
    #[must_use]
    pub fn new(duration: Duration, token: CancellationToken) -> Self {
        Self { duration, token }
    }

    /// Waits for the duration or cancellation, whichever comes first.
    pub async fn wait(&self) -> DelayOutcome {
        if self.token.is_cancelled() {
            return DelayOutcome::Cancelled;
        }
        tokio::select! {
            () = tokio::time::sleep(self.duration) => DelayOutcome::Elapsed,
            () = self.token.cancelled() => DelayOutcome::Cancelled,
        }
    }

    /// Cancels the delay.
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_elapses() {
        let started = Instant::now();
        let delay = CancellableDelay::new(Duration::from_secs(3), CancellationToken::new());

        assert_eq!(delay.wait().await, DelayOutcome::Elapsed);
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_completes_early() {
        let started = Instant::now();
        let delay = CancellableDelay::new(Duration::from_secs(20), CancellationToken::new());
        let canceller = delay.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        assert_eq!(delay.wait().await, DelayOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let delay = CancellableDelay::new(Duration::from_secs(20), token);
        assert_eq!(delay.wait().await, DelayOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_until_cancelled() {
        let delay = CancellableDelay::new(Duration::from_secs(20), CancellationToken::new());
        let mut wait = tokio_test::task::spawn(delay.wait());

        tokio_test::assert_pending!(wait.poll());
        delay.cancel();

        assert!(wait.is_woken());
        tokio_test::assert_ready_eq!(wait.poll(), DelayOutcome::Cancelled);
    }
}
