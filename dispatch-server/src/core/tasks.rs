//! Background task registry
//!
//! Long-running tasks register here so shutdown can cancel and drain them
//! in one place. A panicking task is caught and logged; it never takes the
//! process down.

use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Orchestrator,
    PositionSimulator,
}

impl TaskKind {
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::Orchestrator => "orchestrator",
            TaskKind::PositionSimulator => "position-simulator",
        }
    }
}

#[derive(Default)]
pub struct BackgroundTasks {
    cancel: CancellationToken,
    handles: Mutex<Vec<(TaskKind, JoinHandle<()>)>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token tasks should watch for shutdown
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Spawn a task under panic containment
    pub fn spawn<F>(&self, kind: TaskKind, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if AssertUnwindSafe(future).catch_unwind().await.is_err() {
                tracing::error!("background task '{}' panicked", kind.name());
            }
        });
        self.handles.lock().push((kind, handle));
        tracing::debug!("background task '{}' spawned", kind.name());
    }

    /// Cancel everything and wait for the tasks to drain
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let handles = std::mem::take(&mut *self.handles.lock());
        for (kind, handle) in handles {
            if handle.await.is_err() {
                tracing::warn!("background task '{}' aborted", kind.name());
            } else {
                tracing::info!("background task '{}' stopped", kind.name());
            }
        }
    }
}
