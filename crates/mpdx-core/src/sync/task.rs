//! Fire-and-forget sync unit

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use super::SyncResult;

type SyncFuture = Pin<Box<dyn Future<Output = SyncResult<()>> + Send + 'static>>;
type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

/// A labelled sync job, usually one `sync_*` call of a sync service.
pub struct SyncTask {
    label: String,
    future: SyncFuture,
    on_complete: Vec<CompletionCallback>,
}

impl SyncTask {
    pub fn new(
        label: impl Into<String>,
        future: impl Future<Output = SyncResult<()>> + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            future: Box::pin(future),
            on_complete: Vec::new(),
        }
    }

    /// Add a callback that runs once the task ends, including by panic or
    /// cancellation. Callbacks run in the order they were added.
    #[must_use]
    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete.push(Box::new(callback));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn run(self) -> SyncResult<()> {
        let _complete = OnComplete(self.on_complete);
        self.future.await
    }
}

/// Runs the completion callbacks on drop.
struct OnComplete(Vec<CompletionCallback>);

impl Drop for OnComplete {
    fn drop(&mut self) {
        for callback in self.0.drain(..) {
            callback();
        }
    }
}

impl fmt::Debug for SyncTask {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncTask")
            .field("label", &self.label)
            .field("on_complete", &self.on_complete.len())
            .finish_non_exhaustive()
    }
}
