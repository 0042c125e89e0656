//! Offloads synchronous filesystem calls from the async executor.

use tokio::task::JoinError;

/// Runs `f` on tokio's blocking pool, mapping a join failure with
/// `map_err` into the caller's error type.
pub(crate) async fn run_blocking<F, T, E, M>(f: F, map_err: M) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    M: FnOnce(JoinError) -> E,
{
    tokio::task::spawn_blocking(f).await.map_err(map_err)?
}
