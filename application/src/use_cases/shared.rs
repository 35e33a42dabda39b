//! Shared utilities for use cases.
//!
//! Cancellation checks and cancellable waits used by the executor, the gate
//! runner and the agent coordinator.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Check if cancellation has been requested.
pub(crate) fn is_cancelled(token: &Option<CancellationToken>) -> bool {
    token.as_ref().is_some_and(|t| t.is_cancelled())
}

/// Await `future` unless the token is cancelled first.
///
/// Returns `None` on cancellation; the future is dropped, which kills any
/// child process it owns.
pub(crate) async fn run_cancellable<F: Future>(
    token: &Option<CancellationToken>,
    future: F,
) -> Option<F::Output> {
    match token {
        Some(token) => tokio::select! {
            output = future => Some(output),
            _ = token.cancelled() => None,
        },
        None => Some(future.await),
    }
}

/// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
pub(crate) async fn sleep_cancellable(token: &Option<CancellationToken>, delay: Duration) -> bool {
    run_cancellable(token, tokio::time::sleep(delay)).await.is_some()
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
