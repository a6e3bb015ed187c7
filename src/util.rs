// src/util.rs - Shared helpers

use std::any::Any;
use std::future::Future;
use std::time::Duration;

use crate::infra::errors::LinguaMetricaError;

/// Truncate a string for display/logging (UTF-8 safe).
///
/// Returns a substring of at most `max_len` bytes, ensuring the cut
/// point falls on a valid UTF-8 character boundary.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

/// Await `fut`, failing with `Timeout` once `limit` elapses. `None` waits
/// indefinitely.
pub async fn with_timeout<F, T>(
    operation: &str,
    limit: Option<Duration>,
    fut: F,
) -> Result<T, LinguaMetricaError>
where
    F: Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            LinguaMetricaError::Timeout {
                operation: operation.to_string(),
                seconds: limit.as_secs(),
            }
        }),
        None => Ok(fut.await),
    }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
