//! Per-request cancellation tokens
//!
//! Every send attempt gets its own [`RequestToken`]. The token wraps a
//! [`tokio_util::sync::CancellationToken`] (which the transport awaits to
//! tear down the HTTP request) together with a generation number that the
//! conversation state uses to recognise the request it belongs to.
//!
//! A stale token can still be signalled, but since the conversation only
//! accepts mutations from the token it currently holds, signalling it has no
//! effect on a newer request.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Cancellation handle bound to a single request attempt
///
/// Cloning a token yields another handle to the same attempt.
#[derive(Debug, Clone)]
pub struct RequestToken {
    generation: u64,
    inner: CancellationToken,
}

impl RequestToken {
    /// Generation number, unique within the issuing controller
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Transition the token to its cancelled state (idempotent)
    pub fn signal(&self) {
        self.inner.cancel();
    }

    /// Whether [`RequestToken::signal`] has been called on any handle
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token is signalled
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }

    /// Returns true when both handles refer to the same request attempt
    pub fn same_request(&self, other: &RequestToken) -> bool {
        self.generation == other.generation
    }
}

/// Issues request tokens with strictly increasing generations
#[derive(Debug, Default)]
pub struct CancellationController {
    issued: AtomicU64,
}

impl CancellationController {
    /// Create a controller whose first token has generation 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh, unsignalled token
    pub fn issue(&self) -> RequestToken {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        RequestToken {
            generation,
            inner: CancellationToken::new(),
        }
    }
}
