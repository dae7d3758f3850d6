//! Running-count signal for background sync work

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use super::SyncTask;

/// Spawns sync tasks and publishes how many are in flight.
///
/// The count covers each batch and each task inside it, so it stays above
/// zero from the moment a batch is submitted until its last task finishes.
#[derive(Clone)]
pub struct SyncTracker {
    running: Arc<watch::Sender<usize>>,
    initial_sync_finished: Arc<AtomicBool>,
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTracker {
    pub fn new() -> Self {
        let (running, _) = watch::channel(0);
        Self {
            running: Arc::new(running),
            initial_sync_finished: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn running(&self) -> usize {
        *self.running.borrow()
    }

    pub fn is_syncing(&self) -> bool {
        self.running() > 0
    }

    /// Watch the running count.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.running.subscribe()
    }

    /// True once the first batch has run to completion.
    pub fn initial_sync_finished(&self) -> bool {
        self.initial_sync_finished.load(Ordering::SeqCst)
    }

    pub fn run_sync_task(&self, task: SyncTask) -> JoinHandle<()> {
        self.run_sync_tasks(vec![task])
    }

    /// Run `tasks` concurrently in the background.
    ///
    /// Task errors and panics are logged, never propagated. Aborting the
    /// returned handle cancels every task in the batch.
    pub fn run_sync_tasks(&self, tasks: Vec<SyncTask>) -> JoinHandle<()> {
        let batch = RunningGuard::new(&self.running);
        let mut set = JoinSet::new();
        let mut labels = Vec::with_capacity(tasks.len());

        for task in tasks {
            let guard = RunningGuard::new(&self.running);
            labels.push(task.label().to_string());
            let label = task.label().to_string();
            set.spawn(async move {
                let _guard = guard;
                (label, task.run().await)
            });
        }

        let initial_sync_finished = Arc::clone(&self.initial_sync_finished);
        tokio::spawn(async move {
            let _batch = batch;
            tracing::debug!(tasks = ?labels, "Sync batch started");

            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((_, Ok(()))) => {}
                    Ok((label, Err(error))) => {
                        tracing::error!(task = %label, %error, "Sync task failed");
                    }
                    Err(error) if error.is_panic() => {
                        tracing::error!(%error, "Sync task panicked");
                    }
                    Err(error) => {
                        tracing::debug!(%error, "Sync task cancelled");
                    }
                }
            }

            initial_sync_finished.store(true, Ordering::SeqCst);
        })
    }
}

/// Holds one unit of the running count until dropped.
struct RunningGuard {
    running: Arc<watch::Sender<usize>>,
}

impl RunningGuard {
    fn new(running: &Arc<watch::Sender<usize>>) -> Self {
        running.send_modify(|count| *count += 1);
        Self {
            running: Arc::clone(running),
        }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running
            .send_modify(|count| *count = count.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ApiError, SyncError, SyncResult};
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn wait_for_count(tracker: &SyncTracker, expected: usize) {
        let mut receiver = tracker.subscribe();
        tokio::time::timeout(
            Duration::from_secs(2),
            receiver.wait_for(|count| *count == expected),
        )
        .await
        .expect("running count did not settle")
        .unwrap();
    }

    async fn explode() -> SyncResult<()> {
        panic!("sync body exploded")
    }

    #[tokio::test]
    async fn counts_batch_and_tasks_until_done() {
        let tracker = SyncTracker::new();
        assert!(!tracker.is_syncing());

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let handle = tracker.run_sync_tasks(vec![
            SyncTask::new("waits", async move {
                release_rx.await.ok();
                Ok(())
            }),
            SyncTask::new("quick", async { Ok(()) }),
        ]);

        assert!(tracker.is_syncing());
        assert!(!tracker.initial_sync_finished());
        // the quick task finishes; the batch and the waiting task remain
        wait_for_count(&tracker, 2).await;

        release_tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(tracker.running(), 0);
        assert!(tracker.initial_sync_finished());
    }

    #[tokio::test]
    async fn failures_and_panics_still_release_count() {
        let tracker = SyncTracker::new();
        let handle = tracker.run_sync_tasks(vec![
            SyncTask::new("fails", async {
                Err(SyncError::Api(ApiError::Transient("offline".to_string())))
            }),
            SyncTask::new("panics", explode()),
        ]);

        handle.await.unwrap();
        assert_eq!(tracker.running(), 0);
        assert!(tracker.initial_sync_finished());
    }

    #[tokio::test]
    async fn abort_releases_count() {
        let tracker = SyncTracker::new();
        let handle = tracker.run_sync_task(SyncTask::new(
            "forever",
            std::future::pending::<SyncResult<()>>(),
        ));
        wait_for_count(&tracker, 2).await;

        handle.abort();
        wait_for_count(&tracker, 0).await;
        assert!(!tracker.initial_sync_finished());
    }

    #[tokio::test]
    async fn empty_batch_finishes_immediately() {
        let tracker = SyncTracker::new();
        tracker.run_sync_tasks(Vec::new()).await.unwrap();
        assert!(!tracker.is_syncing());
        assert!(tracker.initial_sync_finished());
    }
}
