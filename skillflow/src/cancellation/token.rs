//! Cancellation token for cooperative cancellation.

use crate::errors::ExecutionCancelledError;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A one-shot token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first reason is kept. Nothing is
/// interrupted by the token itself; holders poll [`is_cancelled`] or
/// [`check`] at their own safe points, or await [`cancelled`] to wake early
/// from a sleep.
///
/// [`is_cancelled`]: CancellationToken::is_cancelled
/// [`check`]: CancellationToken::check
/// [`cancelled`]: CancellationToken::cancelled
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Wakes tasks awaiting cancellation.
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation with a reason.
    ///
    /// Returns true if this call set the signal, false if it was already set.
    /// Tasks waiting in [`cancelled`](Self::cancelled) are woken.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        *self.reason.write() = Some(reason.into());
        self.notify.notify_waiters();
        true
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Fails with the stored reason if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionCancelledError`] once the signal is set.
    pub fn check(&self) -> Result<(), ExecutionCancelledError> {
        if self.is_cancelled() {
            Err(ExecutionCancelledError::new(
                self.reason().unwrap_or_else(|| "cancelled".to_string()),
            ))
        } else {
            Ok(())
        }
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}
