//! Work that outlives the request that started it.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};

/// Runs `fut` on its own task under a fresh root span that carries only
/// `request_id`. Cancelling or dropping the caller does not cancel it.
pub fn spawn_detached<F>(request_id: &str, fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let span = info_span!(parent: None, "detached", request_id = %request_id);
    tokio::spawn(fut.instrument(span))
}
