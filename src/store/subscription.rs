//! Live query handle
//!
//! A subscription is a background task pushing snapshots into a channel.
//! Holding the handle keeps the listener alive; dropping it aborts the task.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ServiceResult;

pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<ServiceResult<T>>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Spawn `producer` with the sending half of a fresh channel.
    pub fn spawn<F, Fut>(producer: F) -> Self
    where
        F: FnOnce(mpsc::UnboundedSender<ServiceResult<T>>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(producer(tx));
        Self { rx, task }
    }

    /// Next snapshot (or listener error). `None` once the listener has stopped.
    pub async fn next(&mut self) -> Option<ServiceResult<T>> {
        self.rx.recv().await
    }

    /// Transform every snapshot. The returned handle owns this one, so
    /// dropping it tears down the whole chain.
    pub fn map<U, F>(mut self, f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: Fn(T) -> ServiceResult<U> + Send + 'static,
    {
        Subscription::spawn(move |tx| async move {
            while let Some(item) = self.next().await {
                if tx.send(item.and_then(&f)).is_err() {
                    break;
                }
            }
        })
    }

    /// Explicit unsubscribe.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
