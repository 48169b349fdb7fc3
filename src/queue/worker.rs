use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use super::handle::QueueHandle;
use super::state::{QueueItem, QueueLifecycle, Shared};
use crate::error::QueueError;
use crate::stock::BulkStockUpdater;

/// The single worker that drains the stock update queue.
///
/// Batches run one at a time in arrival order. Shutdown lets the batch in
/// flight finish and rejects everything still waiting.
pub struct StockUpdateQueue {
    shared: Arc<Shared>,
    updater: BulkStockUpdater,
    idle_pause: Duration,
}

impl StockUpdateQueue {
    pub fn new(updater: BulkStockUpdater, idle_pause: Duration) -> (Self, QueueHandle) {
        let shared = Arc::new(Shared::new());
        let worker = Self {
            shared: shared.clone(),
            updater,
            idle_pause,
        };
        (worker, QueueHandle::new(shared))
    }

    /// Opens the queue for new batches and starts the worker task.
    pub fn spawn(self) -> JoinHandle<()> {
        self.shared.state.lock().lifecycle = QueueLifecycle::Running;
        tokio::spawn(self.run())
    }

    #[instrument(name = "stock_update_queue", skip(self))]
    async fn run(self) {
        info!("Starting queue processor");

        loop {
            let next = {
                let mut state = self.shared.state.lock();
                if state.lifecycle != QueueLifecycle::Running {
                    break;
                }
                let next = state.items.pop_front();
                state.processing = next.is_some();
                next
            };

            match next {
                Some(item) => {
                    self.process(item).await;
                    tokio::select! {
                        _ = tokio::time::sleep(self.idle_pause) => {}
                        _ = self.shared.wake.notified() => {}
                    }
                }
                None => self.shared.wake.notified().await,
            }
        }

        self.reject_pending();
        info!("Queue processor stopped");
    }

    #[instrument(skip(self, item), fields(batch_size = item.updates.len()))]
    async fn process(&self, item: QueueItem) {
        let QueueItem { updates, respond_to } = item;
        info!("Processing batch of {} lot updates", updates.len());

        // A panic inside the use case must not take the worker down with it.
        let updater = self.updater.clone();
        let result = tokio::spawn(async move { updater.update_stock(&updates).await })
            .await
            .unwrap_or_else(|e| Err(QueueError::Panicked(e.to_string())));

        match &result {
            Ok(outcome) => info!(updated = outcome.total_updated, "Successfully processed lot updates"),
            Err(e) => error!(error = %e, "Error processing batch"),
        }

        self.shared.state.lock().record(result.is_ok());
        let _ = respond_to.send(result);
    }

    fn reject_pending(&self) {
        let pending: Vec<QueueItem> = {
            let mut state = self.shared.state.lock();
            state.lifecycle = QueueLifecycle::Stopped;
            state.processing = false;
            state.items.drain(..).collect()
        };

        if !pending.is_empty() {
            warn!("Rejecting {} pending requests due to shutdown", pending.len());
        }
        for item in pending {
            let _ = item.respond_to.send(Err(QueueError::ShuttingDown));
        }
    }
}
