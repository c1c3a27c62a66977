//! Latest-wins task slot.

use std::future::Future;
use tokio::task::JoinHandle;

/// Holds at most one in-flight task. Starting a new one aborts the previous.
///
/// Dropping the slot aborts whatever is still running.
#[derive(Debug, Default)]
pub struct LatestTask {
    current: Option<JoinHandle<()>>,
}

impl LatestTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the running task, if any, and spawns `future` in its place.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.current = Some(tokio::spawn(future));
    }

    /// Aborts the running task, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.current.take() {
            task.abort();
        }
    }

    /// True while a task is held and has not finished.
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Removes the task from the slot without aborting it.
    pub fn take(&mut self) -> Option<JoinHandle<()>> {
        self.current.take()
    }
}

impl Drop for LatestTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
