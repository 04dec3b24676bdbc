//! Polling for long running API operations
//!
//! Some endpoints finish their work asynchronously (file ingestion,
//! fine-tuning) or refuse a request until other work completes (a file in
//! use cannot be deleted). `retry_until` re-runs an operation on a fixed
//! interval until it reports `Poll::Done`, fails with an error, runs out of
//! time, or the request context is cancelled.

use super::error::ApiError;
use std::future::Future;
use std::time::{Duration, Instant};
use tfplug::Context;

#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Outcome of a single attempt
#[derive(Debug)]
pub enum Poll<T> {
    Done(T),
    /// Try again after the interval; the reason ends up in the timeout error
    Retry(String),
}

pub async fn retry_until<T, F, Fut>(ctx: &Context, config: PollConfig, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>, ApiError>>,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        if ctx.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        attempt += 1;

        let reason = match op().await? {
            Poll::Done(value) => return Ok(value),
            Poll::Retry(reason) => reason,
        };

        if started.elapsed() + config.interval > config.timeout {
            return Err(ApiError::PollTimeout {
                seconds: config.timeout.as_secs(),
                last: reason,
            });
        }
        tracing::debug!(
            "Attempt {} not finished ({}), retrying in {:?}",
            attempt,
            reason,
            config.interval
        );
        if !ctx.sleep(config.interval).await {
            return Err(ApiError::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const FAST: PollConfig = PollConfig::new(Duration::from_millis(1), Duration::from_secs(5));

    #[tokio::test]
    async fn returns_once_done() {
        let calls = AtomicU32::new(0);
        let value = retry_until(&Context::new(), FAST, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Ok(Poll::Retry(format!("attempt {}", n)))
            } else {
                Ok(Poll::Done(n))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_until(&Context::new(), FAST, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ApiError::ParseError("bad".to_string()))
        })
        .await;

        assert!(matches!(result, Err(ApiError::ParseError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn times_out_with_last_reason() {
        let config = PollConfig::new(Duration::from_millis(20), Duration::from_millis(50));
        let result: Result<(), _> = retry_until(&Context::new(), config, || async {
            Ok(Poll::Retry("file still in use".to_string()))
        })
        .await;

        match result {
            Err(ApiError::PollTimeout { last, .. }) => assert_eq!(last, "file still in use"),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancelled_context_stops_polling() {
        let ctx = Context::new();
        let config = PollConfig::new(Duration::from_secs(60), Duration::from_secs(600));
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result: Result<(), _> =
            retry_until(&ctx, config, || async { Ok(Poll::Retry("queued".to_string())) }).await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }
}
