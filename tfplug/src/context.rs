//! Request-scoped context carrying cancellation, deadlines and values.
//!
//! The gRPC service hands every provider call a child of a root context.
//! `StopProvider` cancels the root, which cancels every in-flight child, so
//! long polling loops can bail out between requests.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::time;

/// Context carries request-scoped values like cancellation signals, timeouts, and metadata.
/// Passed as the first parameter to every async trait method.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    values: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                values: RwLock::new(HashMap::new()),
                done: done_rx,
                done_tx,
            }),
        }
    }

    /// Creates a child context. The child is cancelled when the parent is.
    pub async fn child(&self) -> Self {
        self.derive(self.inner.deadline).await
    }

    /// Creates a child context that is also cancelled once `timeout` elapses.
    pub async fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        let child = self.derive(Some(deadline)).await;

        let done_tx = child.inner.done_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline.into()) => {
                    let _ = done_tx.send(true);
                }
                _ = done_tx.closed() => {}
            }
        });

        child
    }

    async fn derive(&self, deadline: Option<Instant>) -> Self {
        let (done_tx, done_rx) = watch::channel(*self.inner.done.borrow());
        let values = self.inner.values.read().await.clone();

        let mut parent_done = self.inner.done.clone();
        let child_tx = done_tx.clone();
        tokio::spawn(async move {
            loop {
                if *parent_done.borrow() {
                    let _ = child_tx.send(true);
                    return;
                }
                tokio::select! {
                    changed = parent_done.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = child_tx.closed() => return,
                }
            }
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline,
                values: RwLock::new(values),
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub async fn with_value<T: Send + Sync + 'static>(self, key: &str, value: T) -> Self {
        let mut values = self.inner.values.write().await;
        values.insert(key.to_string(), Arc::new(value));
        drop(values);
        self
    }

    pub async fn get_value<T>(&self, key: &str) -> Option<T>
    where
        T: Send + Sync + Clone + 'static,
    {
        let values = self.inner.values.read().await;
        values.get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Returns a channel that flips to `true` when work done on behalf of
    /// this context should stop.
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        let mut done = self.done();
        while !*done.borrow() {
            if done.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleeps for `duration`, returning `false` early if the context is
    /// cancelled first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = time::sleep(duration) => !self.is_cancelled(),
            _ = self.cancelled() => false,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_stores_and_retrieves_values() {
        let ctx = Context::new();
        let ctx = ctx.with_value("api_key", "secret123".to_string()).await;

        let value: Option<String> = ctx.get_value("api_key").await;
        assert_eq!(value, Some("secret123".to_string()));

        let missing: Option<u32> = ctx.get_value("api_key").await;
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(50)).await;

        assert!(!ctx.is_cancelled());
        sleep(Duration::from_millis(120)).await;
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_timeout_context_releases_its_tasks() {
        let metrics = tokio::runtime::Handle::current().metrics();
        let baseline = metrics.num_alive_tasks();

        let ctx = Context::new().with_timeout(Duration::from_secs(3600)).await;
        assert!(metrics.num_alive_tasks() > baseline);
        drop(ctx);

        tokio::time::timeout(Duration::from_secs(1), async {
            while metrics.num_alive_tasks() > baseline {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("deadline task should stop with its context");
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());

        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_parent_cancels_child() {
        let root = Context::new();
        let child = root.child().await;

        root.cancel();
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child should observe parent cancellation");
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn child_keeps_parent_values() {
        let root = Context::new().with_value("request", 7u32).await;
        let child = root.child().await;
        assert_eq!(child.get_value::<u32>("request").await, Some(7));
    }

    #[tokio::test]
    async fn sleep_returns_false_when_cancelled() {
        let ctx = Context::new();
        let cancel = ctx.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        assert!(!ctx.sleep(Duration::from_secs(5)).await);
        assert!(Context::new().sleep(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn context_deadline() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());

        let ctx_with_timeout = ctx.with_timeout(Duration::from_secs(1)).await;
        assert!(ctx_with_timeout.deadline().is_some());
    }
}
