//! Cancellation token and the shared poll loop.
//!
//! Every `wait_for_*` operation in the engine is the same loop: attempt a
//! predicate, sleep an interval, check cancellation, give up at a deadline.
//! [`poll_until`] is that loop, written once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::WdaError;

/// Cooperative cancellation flag shared between a caller and the work it
/// started.  Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Return `Err(Cancelled)` when the token has fired.
    pub fn check(&self, what: &str) -> Result<(), WdaError> {
        if self.is_cancelled() {
            Err(WdaError::Cancelled(format!("{what} was cancelled")))
        } else {
            Ok(())
        }
    }
}

/// Poll `attempt` until it yields a value, the timeout expires, or the
/// token fires.
///
/// `attempt` returns `Ok(Some(v))` when the predicate holds, `Ok(None)` to
/// keep waiting, or `Err` to abort immediately (structural failures are not
/// retried).  On timeout the function returns `Ok(None)` so the caller can
/// attach its own last-observed-state message.
pub fn poll_until<T, F>(
    timeout: Duration,
    interval: Duration,
    cancel: &CancelToken,
    mut attempt: F,
) -> Result<Option<T>, WdaError>
where
    F: FnMut() -> Result<Option<T>, WdaError>,
{
    let deadline = Instant::now() + timeout;

    loop {
        cancel.check("wait loop")?;

        if let Some(value) = attempt()? {
            return Ok(Some(value));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }

        let remaining = deadline - now;
        std::thread::sleep(remaining.min(interval));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_success_skips_sleeping() {
        let cancel = CancelToken::new();
        let start = Instant::now();
        let result = poll_until(
            Duration::from_secs(5),
            Duration::from_millis(100),
            &cancel,
            || Ok(Some(42)),
        )
        .unwrap();
        assert_eq!(result, Some(42));
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn predicate_eventually_holds() {
        let cancel = CancelToken::new();
        let mut attempts = 0;
        let result = poll_until(
            Duration::from_secs(5),
            Duration::from_millis(1),
            &cancel,
            || {
                attempts += 1;
                Ok(if attempts >= 3 { Some(attempts) } else { None })
            },
        )
        .unwrap();
        assert_eq!(result, Some(3));
    }

    #[test]
    fn timeout_returns_none() {
        let cancel = CancelToken::new();
        let result: Option<()> = poll_until(
            Duration::from_millis(20),
            Duration::from_millis(5),
            &cancel,
            || Ok(None),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn cancelled_token_aborts() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result: Result<Option<()>, _> = poll_until(
            Duration::from_secs(5),
            Duration::from_millis(5),
            &cancel,
            || Ok(None),
        );
        assert!(matches!(result, Err(WdaError::Cancelled(_))));
    }

    #[test]
    fn attempt_error_is_not_retried() {
        let cancel = CancelToken::new();
        let mut attempts = 0;
        let result: Result<Option<()>, _> = poll_until(
            Duration::from_secs(5),
            Duration::from_millis(1),
            &cancel,
            || {
                attempts += 1;
                Err(WdaError::InvalidHandle("gone".into()))
            },
        );
        assert!(matches!(result, Err(WdaError::InvalidHandle(_))));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn token_clones_share_state() {
        let a = CancelToken::new();
        let b = a.clone();
        b.cancel();
        assert!(a.is_cancelled());
        assert!(a.check("op").is_err());
    }
}
