//! Live Queries
//!
//! A `LiveQuery<T>` is a subscription that yields complete result snapshots:
//! one immediately, then one after every [`StoreChange`]. Consumers render the
//! latest snapshot and never apply deltas.
//!
//! # Lifecycle
//!
//! 1. The change receiver is subscribed by the caller *before* the query
//!    future first runs, so a write landing between the initial read and the
//!    subscription cannot be missed
//! 2. A background task runs the query, sends the snapshot, then waits for
//!    the next change
//! 3. If the task falls behind the broadcast buffer (`Lagged`), it re-runs
//!    the query; snapshots are complete, so nothing is lost
//! 4. Dropping the `LiveQuery` aborts the task (unsubscribe)
//!
//! Query errors are logged and the subscription keeps waiting for the next
//! change.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use rubix_core::services::NodeService;
//! # async fn example(service: NodeService) {
//! let mut roots = service.watch_children(None);
//! while let Some(snapshot) = roots.next().await {
//!     println!("{} nodes at the root", snapshot.len());
//! }
//! # }
//! ```

use crate::db::events::StoreChange;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;

/// Subscription yielding a fresh `T` after every store change
pub struct LiveQuery<T> {
    snapshots: mpsc::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> LiveQuery<T> {
    /// Start a live query on the current Tokio runtime
    ///
    /// # Arguments
    ///
    /// * `changes` - Receiver subscribed before this call
    /// * `buffer` - Number of undelivered snapshots kept before the task waits
    /// * `label` - Name used in log lines
    /// * `query` - Produces one complete snapshot per call
    pub fn spawn<F, Fut>(
        changes: broadcast::Receiver<StoreChange>,
        buffer: usize,
        label: &'static str,
        query: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let (tx, snapshots) = mpsc::channel(buffer.max(1));

        let task = tokio::spawn(async move {
            let mut changes = changes;

            loop {
                match query().await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(query = label, error = %e, "Live query failed");
                    }
                }

                match changes.recv().await {
                    Ok(change) => {
                        tracing::debug!(
                            query = label,
                            event = change.event_type(),
                            "Re-running live query"
                        );
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(query = label, skipped, "Live query lagged, re-running");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self { snapshots, task }
    }
}

impl<T> LiveQuery<T> {
    /// Wait for the next snapshot
    ///
    /// Returns `None` only after the change sender passed to `spawn` has been
    /// dropped and every buffered snapshot has been consumed. Queries built
    /// by `NodeService` keep their store alive, so for them this waits until
    /// the next change.
    pub async fn next(&mut self) -> Option<T> {
        self.snapshots.recv().await
    }

    /// Take a buffered snapshot without waiting
    pub fn try_next(&mut self) -> Option<T> {
        self.snapshots.try_recv().ok()
    }
}

impl<T> Stream for LiveQuery<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().snapshots.poll_recv(cx)
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::events::StoreOperation;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn counting_query(
        counter: Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<anyhow::Result<usize>> + Send + 'static {
        move || std::future::ready(Ok(counter.fetch_add(1, Ordering::SeqCst) + 1))
    }

    #[tokio::test]
    async fn test_initial_snapshot_then_one_per_change() {
        let (tx, rx) = broadcast::channel(8);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut live = LiveQuery::spawn(rx, 4, "test", counting_query(counter.clone()));

        assert_eq!(live.next().await, Some(1));

        tx.send(StoreChange::single(StoreOperation::Upserted, "a"))
            .unwrap();
        assert_eq!(live.next().await, Some(2));

        tx.send(StoreChange::single(StoreOperation::Trashed, "a"))
            .unwrap();
        assert_eq!(live.next().await, Some(3));
    }

    #[tokio::test]
    async fn test_lagged_receiver_re_queries() {
        let (tx, rx) = broadcast::channel(1);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut live = LiveQuery::spawn(rx, 1, "lagging", counting_query(counter.clone()));

        assert_eq!(live.next().await, Some(1));

        // Overflow the single-slot broadcast buffer
        for _ in 0..5 {
            let _ = tx.send(StoreChange::single(StoreOperation::Pinned, "a"));
        }

        let snapshot = tokio::time::timeout(Duration::from_secs(2), live.next())
            .await
            .expect("snapshot after lag");
        assert!(snapshot.unwrap() >= 2);
    }

    #[tokio::test]
    async fn test_stream_ends_when_store_closes() {
        let (tx, rx) = broadcast::channel(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut live = LiveQuery::spawn(rx, 4, "closing", counting_query(counter));

        assert_eq!(StreamExt::next(&mut live).await, Some(1));
        drop(tx);
        assert_eq!(StreamExt::next(&mut live).await, None);
    }

    #[tokio::test]
    async fn test_query_errors_keep_subscription_alive() {
        let (tx, rx) = broadcast::channel(4);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_query = calls.clone();

        let mut live = LiveQuery::spawn(rx, 4, "flaky", move || {
            let call = calls_in_query.fetch_add(1, Ordering::SeqCst);
            async move {
                if call == 0 {
                    Err(anyhow::anyhow!("transient failure"))
                } else {
                    Ok(call)
                }
            }
        });

        tx.send(StoreChange::single(StoreOperation::Upserted, "a"))
            .unwrap();
        assert_eq!(live.next().await, Some(1));
    }

    #[tokio::test]
    async fn test_drop_aborts_background_task() {
        let (tx, rx) = broadcast::channel::<StoreChange>(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let mut live = LiveQuery::spawn(rx, 4, "dropped", counting_query(counter));
        assert_eq!(live.next().await, Some(1));

        drop(live);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(tx.receiver_count(), 0);
    }
}
