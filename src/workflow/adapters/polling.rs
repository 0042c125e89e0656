//! Bounded polling shared by the lock adapters.

use std::future::Future;
use std::time::{Duration, Instant};

/// Awaits `attempt` every `interval` until it yields a value or `timeout`
/// elapses. Yields `Ok(value)`, or `Err(waited)` on timeout.
pub(crate) async fn poll_until<T, E, F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut attempt: F,
) -> Result<Result<T, Duration>, E>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>, E>> + Send,
    T: Send,
    E: Send,
{
    let started = Instant::now();
    loop {
        if let Some(value) = attempt().await? {
            return Ok(Ok(value));
        }
        let waited = started.elapsed();
        if waited >= timeout {
            return Ok(Err(waited));
        }
        tokio::time::sleep(interval).await;
    }
}
