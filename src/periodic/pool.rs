use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::fetch::{FeedSource, FetchError, FetchOutcome};
use super::task::FetchTask;

pub type Completion = (FetchTask, FetchOutcome);

/// Pending fetches; poll with `StreamExt::next` to consume them as they finish.
pub type Completions = FuturesUnordered<BoxFuture<'static, Completion>>;

/// Fixed-size pool for blocking-style feed fetches.
///
/// At most `workers` requests are in flight at once. Shutdown refuses new work
/// (late submissions resolve as cancelled) and waits for everything already
/// submitted, queued or running.
pub struct FetchPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    closing: CancellationToken,
    workers: usize,
}

impl FetchPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        FetchPool { permits: Arc::new(Semaphore::new(workers)), tracker: TaskTracker::new(), closing: CancellationToken::new(), workers }
    }

    pub fn workers(&self) -> usize { self.workers }

    pub fn dispatch(&self, source: Arc<dyn FeedSource>, tasks: Vec<FetchTask>) -> Completions {
        let pending = FuturesUnordered::new();
        for task in tasks {
            if self.closing.is_cancelled() {
                tracing::debug!(url = %task.rss_url, "pool is shut down, not scheduling");
                pending.push(futures::future::ready((task, Err(FetchError::Cancelled))).boxed());
                continue;
            }
            tracing::debug!(url = %task.rss_url, "scheduling call out");
            let permits = Arc::clone(&self.permits);
            let source = Arc::clone(&source);
            let url = task.rss_url.clone();
            let handle = self.tracker.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return Err(FetchError::Cancelled);
                };
                source.fetch(&url).await
            });
            pending.push(
                async move {
                    let outcome = match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) if e.is_cancelled() => Err(FetchError::Cancelled),
                        Err(e) => Err(FetchError::Other(format!("fetch task failed: {e}"))),
                    };
                    (task, outcome)
                }
                .boxed(),
            );
        }
        pending
    }

    pub async fn shutdown(&self) {
        self.closing.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
