use std::time::Duration;

use backon::ExponentialBuilder;
use tokio_util::sync::CancellationToken;

/// Jittered exponential backoff between `min_delay` and `max_delay`.
pub fn backoff(min_delay: Duration, max_delay: Duration, max_times: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(min_delay)
        .with_max_delay(max_delay)
        .with_max_times(max_times)
        .with_jitter()
}

/// Sleeps for `delay` unless `token` is cancelled first, returns false when cancelled.
pub async fn sleep_or_cancel(delay: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
