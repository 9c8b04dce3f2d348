//! Cancellation plumbing shared by every blocking listener call.

use std::future::Future;
use std::time::Duration;

use scaleset::ListenerError;
use tokio_util::sync::CancellationToken;

/// Races `future` against `cancel`.
///
/// Cancellation wins ties, so a token that has already fired never lets a
/// ready future through. The losing future is dropped, which aborts an
/// in-flight long-poll.
pub(crate) async fn cancellable<F>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, ListenerError>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ListenerError::Cancelled),
        output = future => Ok(output),
    }
}

/// Sleeps for `duration` unless `cancel` fires first.
pub(crate) async fn sleep(cancel: &CancellationToken, duration: Duration) -> Result<(), ListenerError> {
    cancellable(cancel, tokio::time::sleep(duration)).await
}
