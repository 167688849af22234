//! Readiness polling with a fixed retry interval.
//!
//! Host editors load at their own pace, so waiting for them has no attempt
//! limit. The only way out besides success is the cancellation token.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("polling cancelled")]
pub struct Cancelled;

/// Call `check` every `interval` until it yields a value.
pub async fn until<T>(
    mut check: impl FnMut() -> Option<T>,
    interval: Duration,
    cancel: &CancellationToken,
) -> Result<T, Cancelled> {
    loop {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        if let Some(value) = check() {
            return Ok(value);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
