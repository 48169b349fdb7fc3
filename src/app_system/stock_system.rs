use std::sync::Arc;

use tracing::{error, info};

use super::AppConfig;
use crate::clients::StockClient;
use crate::error::ConfigError;
use crate::queue::{QueueHandle, StockUpdateQueue};
use crate::stock::BulkStockUpdater;
use crate::store::{JsonLotStore, LotStore};

/// The running stock update subsystem.
///
/// Responsible for wiring the lot store, the bulk updater and the queue
/// worker together, and for shutting the worker down.
pub struct StockSystem {
    pub stock_client: StockClient,
    queue: QueueHandle,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl StockSystem {
    /// Starts the system over the JSON lot collection named in `config`.
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        let store = JsonLotStore::new(config.lots_path.clone(), config.lock.clone());
        Self::with_store(Arc::new(store), config)
    }

    pub fn with_store(store: Arc<dyn LotStore>, config: &AppConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(chunk_size = config.chunk_size, "Starting stock system");

        let updater = BulkStockUpdater::new(store, config.chunk_size);
        let (worker, queue) = StockUpdateQueue::new(updater, config.idle_poll_interval);
        let worker_handle = worker.spawn();

        Ok(Self {
            stock_client: StockClient::new(queue.clone()),
            queue,
            handles: vec![worker_handle],
        })
    }

    /// Stops accepting batches, lets the batch in flight finish, rejects the
    /// rest and waits for the worker to exit.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down system...");
        self.queue.shutdown();

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Queue worker failed: {:?}", e);
                return Err(format!("Queue worker failed: {:?}", e));
            }
        }

        info!("System shutdown complete.");
        Ok(())
    }
}
