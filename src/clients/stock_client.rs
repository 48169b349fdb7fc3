use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::domain::{BulkUpdateResult, RawStockUpdate};
use crate::error::QueueError;
use crate::queue::{QueueHandle, QueueStatus};

/// Queue status as reported to operators, stamped with the time it was taken.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusResponse {
    #[serde(flatten)]
    pub status: QueueStatus,
    pub timestamp: DateTime<Utc>,
}

/// Client for submitting bulk stock updates through the queue.
#[derive(Clone)]
pub struct StockClient {
    queue: QueueHandle,
}

impl StockClient {
    pub fn new(queue: QueueHandle) -> Self {
        Self { queue }
    }

    /// Queues `batch` and waits for its outcome.
    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn submit_stock_updates(&self, batch: Vec<RawStockUpdate>) -> Result<BulkUpdateResult, QueueError> {
        info!("Received update request for {} lots", batch.len());
        let result = match self.queue.enqueue(batch) {
            Ok(pending) => pending.await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!(error = %e, "Error updating stock");
        }
        result
    }

    pub fn queue_status(&self) -> QueueStatusResponse {
        QueueStatusResponse {
            status: self.queue.status(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_framework::RecordingStore;
    use crate::queue::StockUpdateQueue;
    use crate::stock::BulkStockUpdater;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_status_response_wire_shape() {
        let updater = BulkStockUpdater::new(Arc::new(RecordingStore::new()), 10);
        let (worker, queue) = StockUpdateQueue::new(updater, Duration::from_millis(1));
        let task = worker.spawn();
        let client = StockClient::new(queue.clone());

        let json = serde_json::to_value(client.queue_status()).unwrap();
        assert_eq!(json["queue_size"], 0);
        assert_eq!(json["is_processing"], false);
        assert_eq!(json["is_active"], true);
        assert_eq!(json["metrics"]["pending_updates_count"], 0);
        assert_eq!(json["metrics"]["total_processed"], 0);
        assert_eq!(json["metrics"]["last_processed_at"], serde_json::Value::Null);
        assert!(json["timestamp"].is_string());

        queue.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let updater = BulkStockUpdater::new(Arc::new(RecordingStore::new()), 10);
        let (worker, queue) = StockUpdateQueue::new(updater, Duration::from_millis(1));
        let task = worker.spawn();
        let client = StockClient::new(queue.clone());

        queue.shutdown();
        let err = client
            .submit_stock_updates(vec![json!({"product_id": 1, "warehouse_id": 1, "stock": 1})])
            .await
            .unwrap_err();
        assert_eq!(err, QueueError::NotAccepting);
        task.await.unwrap();
    }
}
