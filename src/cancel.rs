//! Cooperative cancellation for channel operations.
//!
//! Every channel operation takes a [`Cancellation`] and races its transport
//! I/O against it. A fired cancellation unwinds the operation, releases any
//! buffer it was filling and surfaces [`Error::Cancelled`].
//!
//! This layer imposes no timeouts of its own. Callers that want a deadline
//! use [`Cancellation::after`].
//!
//! [`Error::Cancelled`]: crate::error::Error::Cancelled
//!
//! # Example
//!
//! ```ignore
//! let (handle, cancel) = Cancellation::new();
//!
//! tokio::spawn(async move {
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     handle.cancel();
//! });
//!
//! let reply = channel.receive(&cancel).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

// ============================================================================
// CancelHandle
// ============================================================================

/// Triggering side of a [`Cancellation`].
///
/// Cloning shares the same signal. Cancelling is idempotent.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Fires the cancellation signal.
    #[inline]
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns `true` if [`cancel`](Self::cancel) has been called.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Observing side of a cancellation signal.
///
/// Cheap to clone; every clone observes the same signal.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    /// `None` never fires.
    rx: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// Creates a linked handle/token pair.
    #[must_use]
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx: Arc::new(tx) }, Self { rx: Some(rx) })
    }

    /// Returns a token that never fires.
    #[inline]
    #[must_use]
    pub const fn never() -> Self {
        Self { rx: None }
    }

    /// Returns a token that fires after `duration`.
    ///
    /// Spawns a timer task on the current tokio runtime. The task exits early
    /// once every clone of the token is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn after(duration: Duration) -> Self {
        let (handle, token) = Self::new();

        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(duration) => handle.cancel(),
                () = handle.tx.closed() => {}
            }
        });

        token
    }

    /// Returns `true` if the signal has fired.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Completes once the signal fires.
    ///
    /// Pends forever for [`never`](Self::never) tokens, and for tokens whose
    /// handles were all dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.rx else {
            return pending().await;
        };

        let mut rx = rx.clone();
        if rx.wait_for(|fired| *fired).await.is_err() {
            pending::<()>().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
