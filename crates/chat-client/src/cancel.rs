//! Composed cancellation.
//!
//! Each attempt merges the caller's optional token with the client's
//! timeout into a single effective token. The returned guard disarms
//! the timer and detaches the listener on release, and `Drop` backstops
//! that on every exit path.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::transport::TransportError;

/// Why the composed token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Caller,
    Timeout,
}

/// Effective cancellation token for one attempt plus its release handle.
pub struct ComposedCancel {
    token: CancellationToken,
    cause: Arc<OnceLock<CancelCause>>,
    watcher: Option<JoinHandle<()>>,
    timeout: Option<Duration>,
}

/// Merge an optional caller token with an optional timeout.
///
/// With no timeout (or a zero one) the caller's token is used as-is and
/// release is a no-op. Otherwise a watcher task propagates whichever
/// fires first, recording the cause exactly once before it exits.
pub fn compose(caller: Option<CancellationToken>, timeout: Option<Duration>) -> ComposedCancel {
    let cause = Arc::new(OnceLock::new());
    let timeout = timeout.filter(|delay| !delay.is_zero());

    let Some(delay) = timeout else {
        return ComposedCancel {
            token: caller.unwrap_or_default(),
            cause,
            watcher: None,
            timeout: None,
        };
    };

    let token = CancellationToken::new();
    let effective = token.clone();
    let recorded = Arc::clone(&cause);
    let watcher = tokio::spawn(async move {
        match caller {
            Some(outer) => {
                tokio::select! {
                    _ = outer.cancelled() => {
                        let _ = recorded.set(CancelCause::Caller);
                    }
                    _ = tokio::time::sleep(delay) => {
                        let _ = recorded.set(CancelCause::Timeout);
                    }
                }
            }
            None => {
                tokio::time::sleep(delay).await;
                let _ = recorded.set(CancelCause::Timeout);
            }
        }
        token.cancel();
    });

    ComposedCancel {
        token: effective,
        cause,
        watcher: Some(watcher),
        timeout: Some(delay),
    }
}

impl ComposedCancel {
    /// The effective token handed to the transport.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cause recorded when the composed token fired, if any.
    pub fn cause(&self) -> Option<CancelCause> {
        self.cause.get().copied()
    }

    /// Attribute a transport cancellation to the caller's token or the
    /// internal timeout.
    pub fn fault(&self) -> TransportError {
        match self.cause() {
            Some(CancelCause::Timeout) => {
                TransportError::TimedOut(self.timeout.unwrap_or_default())
            }
            _ => TransportError::Cancelled,
        }
    }

    /// Disarm the timer and detach the caller-token listener.
    pub fn release(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

impl Drop for ComposedCancel {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_fires_with_timeout_cause() {
        let guard = compose(None, Some(Duration::from_millis(50)));
        let token = guard.token();

        token.cancelled().await;
        assert_eq!(guard.cause(), Some(CancelCause::Timeout));
        assert!(matches!(guard.fault(), TransportError::TimedOut(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn caller_cancellation_wins_over_a_longer_timeout() {
        let outer = CancellationToken::new();
        let guard = compose(Some(outer.clone()), Some(Duration::from_secs(60)));
        let token = guard.token();

        outer.cancel();
        token.cancelled().await;
        assert_eq!(guard.cause(), Some(CancelCause::Caller));
        assert!(matches!(guard.fault(), TransportError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn no_timeout_passes_the_caller_token_through() {
        let outer = CancellationToken::new();
        let guard = compose(Some(outer.clone()), None);
        let token = guard.token();

        assert!(!token.is_cancelled());
        outer.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(guard.fault(), TransportError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_is_treated_as_absent() {
        let guard = compose(None, Some(Duration::ZERO));
        let token = guard.token();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!token.is_cancelled());
        assert!(guard.cause().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn release_disarms_the_timer() {
        let mut guard = compose(None, Some(Duration::from_millis(50)));
        let token = guard.token();
        guard.release();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!token.is_cancelled());
        assert!(guard.cause().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_detaches_the_caller_listener() {
        let outer = CancellationToken::new();
        let guard = compose(Some(outer.clone()), Some(Duration::from_secs(60)));
        let token = guard.token();
        drop(guard);

        outer.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cause_is_recorded_exactly_once() {
        let outer = CancellationToken::new();
        let guard = compose(Some(outer.clone()), Some(Duration::from_millis(50)));
        let token = guard.token();

        outer.cancel();
        token.cancelled().await;
        // Let the (now finished) watcher's timer slot elapse as well.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(guard.cause(), Some(CancelCause::Caller));
    }
}
