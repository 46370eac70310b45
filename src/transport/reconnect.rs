//! Reconnect supervisor for mid-session disconnects (§5 "Disconnect
//! handling").

use super::error::TransportError;
use std::time::Duration;
use tracing::{info, warn};

/// Up to three attempts before giving up and surfacing the disconnect to
/// the caller.
pub const MAX_ATTEMPTS: u32 = 3;

/// Backoff unit for a fresh `open()` call (§4.1: `500ms * attempt`).
pub const OPEN_BACKOFF_UNIT: Duration = Duration::from_millis(500);

/// Backoff unit for the outer mid-session reconnect supervisor (§5
/// "Disconnect handling": `1s * attempt`). Distinct from [`OPEN_BACKOFF_UNIT`]
/// — the two are different policies in the spec, not one reused value.
pub const RECONNECT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

pub struct ReconnectSupervisor;

impl ReconnectSupervisor {
    /// Retries `reopen` up to [`MAX_ATTEMPTS`] times, sleeping
    /// `attempt * backoff_unit` between tries. Stops immediately if `reopen`
    /// returns an error [`TransportError::is_retryable_on_open`] says is
    /// final (e.g. permission denied).
    pub async fn run_with_backoff<F, Fut, T>(
        mut reopen: F,
        backoff_unit: Duration,
    ) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        let mut last_err = TransportError::DeviceDisconnected;
        for attempt in 1..=MAX_ATTEMPTS {
            match reopen().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "reconnect succeeded");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    warn!(attempt, ?err, "reconnect attempt failed");
                    if !err.is_retryable_on_open() {
                        return Err(err);
                    }
                    last_err = err;
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_unit * attempt).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    /// Convenience wrapper using [`RECONNECT_BACKOFF_UNIT`] (mid-session
    /// reconnect, §5).
    pub async fn run<F, Fut, T>(reopen: F) -> Result<T, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, TransportError>>,
    {
        Self::run_with_backoff(reopen, RECONNECT_BACKOFF_UNIT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = ReconnectSupervisor::run(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(TransportError::DeviceDisconnected)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), TransportError> = ReconnectSupervisor::run(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::PermissionDenied) }
        })
        .await;
        assert_eq!(result, Err(TransportError::PermissionDenied));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), TransportError> = ReconnectSupervisor::run(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::NotResponding) }
        })
        .await;
        assert_eq!(result, Err(TransportError::NotResponding));
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
