//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::AuthError;

/// Wrap a fallible future with a deadline, mapping expiry to [`AuthError::Timeout`].
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, AuthError>>,
) -> Result<T, AuthError> {
    tokio::time::timeout(duration, future)
        .await
        .unwrap_or_else(|_| Err(AuthError::Timeout(duration.as_millis() as u64)))
}
