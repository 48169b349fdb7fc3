use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::{debug, info};

use super::state::{QueueItem, QueueLifecycle, QueueStatus, Shared};
use crate::domain::{BulkUpdateResult, RawStockUpdate};
use crate::error::QueueError;

/// Cloneable handle for submitting batches to the queue and inspecting it.
#[derive(Clone)]
pub struct QueueHandle {
    shared: Arc<Shared>,
}

/// Resolves exactly once, when the batch has been processed or rejected.
#[derive(Debug)]
pub struct PendingUpdate {
    response: oneshot::Receiver<Result<BulkUpdateResult, QueueError>>,
}

impl Future for PendingUpdate {
    type Output = Result<BulkUpdateResult, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.response)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(QueueError::WorkerGone)))
    }
}

impl QueueHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Appends a batch to the queue without waiting for it to run.
    ///
    /// Fails with [`QueueError::NotAccepting`] unless the queue is running.
    pub fn enqueue(&self, updates: Vec<RawStockUpdate>) -> Result<PendingUpdate, QueueError> {
        let (respond_to, response) = oneshot::channel();
        {
            let mut state = self.shared.state.lock();
            if state.lifecycle != QueueLifecycle::Running {
                return Err(QueueError::NotAccepting);
            }
            info!("Enqueuing update for {} lots", updates.len());
            state.items.push_back(QueueItem { updates, respond_to });
        }
        self.shared.wake.notify_one();
        Ok(PendingUpdate { response })
    }

    pub fn status(&self) -> QueueStatus {
        self.shared.state.lock().status()
    }

    #[allow(dead_code)]
    pub fn lifecycle(&self) -> QueueLifecycle {
        self.shared.state.lock().lifecycle
    }

    /// Stops accepting batches and tells the worker to drain. Returns at once;
    /// wait on the worker's task to know when it has stopped.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.lifecycle == QueueLifecycle::Running {
            info!("Shutting down stock update queue");
            state.lifecycle = QueueLifecycle::Draining;
            drop(state);
            self.shared.wake.notify_one();
        } else {
            debug!(lifecycle = ?state.lifecycle, "Shutdown requested on an inactive queue");
        }
    }
}
