use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::{chunk, partition};
use crate::domain::{BulkUpdateResult, RawStockUpdate};
use crate::error::QueueError;
use crate::store::LotStore;

/// Runs one batch end to end: validate, chunk, apply each chunk under its own
/// lock, aggregate.
///
/// Chunks are applied in order and a failing chunk aborts the rest of the
/// batch. Chunks that were already applied stay applied.
#[derive(Clone)]
pub struct BulkStockUpdater {
    store: Arc<dyn LotStore>,
    chunk_size: usize,
}

impl BulkStockUpdater {
    pub fn new(store: Arc<dyn LotStore>, chunk_size: usize) -> Self {
        Self { store, chunk_size }
    }

    #[instrument(skip(self, batch), fields(batch_size = batch.len()))]
    pub async fn update_stock(&self, batch: &[RawStockUpdate]) -> Result<BulkUpdateResult, QueueError> {
        if batch.is_empty() {
            return Err(QueueError::EmptyBatch);
        }
        info!("Updating stock for {} lots", batch.len());

        let (valid, invalid) = partition(batch);
        debug!(valid = valid.len(), invalid, "Batch validated");

        let mut updated = 0;
        for (n, part) in chunk(&valid, self.chunk_size).into_iter().enumerate() {
            debug!(chunk = n, size = part.len(), "Applying chunk");
            updated += self.store.apply(part).await?.len();
        }

        Ok(BulkUpdateResult::new(batch.len(), valid.len(), updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LotRecord, StockUpdate};
    use crate::error::StoreError;
    use crate::mock_framework::RecordingStore;
    use crate::store::{JsonLotStore, LockConfig};
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_counts_received_valid_invalid_updated() {
        let store = Arc::new(RecordingStore::new().with_missing(2, 2));
        let updater = BulkStockUpdater::new(store.clone(), 100);

        let batch = vec![
            json!({"product_id": 1, "warehouse_id": 1, "stock": 10}),
            json!({"product_id": 2, "warehouse_id": 2, "stock": 20}),
            json!({"product_id": 3, "warehouse_id": 3}),
        ];
        let result = updater.update_stock(&batch).await.unwrap();

        assert_eq!(result, BulkUpdateResult::new(3, 2, 1));
        assert_eq!(result.total_invalid, 1);
        assert_eq!(result.total_received, result.total_valid + result.total_invalid);
    }

    #[tokio::test]
    async fn test_valid_updates_are_applied_in_ordered_chunks() {
        let store = Arc::new(RecordingStore::new());
        let updater = BulkStockUpdater::new(store.clone(), 2);

        let batch: Vec<_> = (1..=5)
            .map(|i| json!({"product_id": i, "warehouse_id": 1, "stock": i * 10}))
            .collect();
        let result = updater.update_stock(&batch).await.unwrap();

        assert_eq!(result.total_updated, 5);
        let calls = store.calls();
        assert_eq!(calls.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 2, 1]);
        assert_eq!(calls[2], vec![StockUpdate::new(5, 1, 50)]);
    }

    #[tokio::test]
    async fn test_all_invalid_batch_never_touches_store() {
        let store = Arc::new(RecordingStore::new());
        let updater = BulkStockUpdater::new(store.clone(), 10);

        let result = updater
            .update_stock(&[json!({"product_id": 1, "warehouse_id": 1, "stock": -5})])
            .await
            .unwrap();

        assert_eq!(result, BulkUpdateResult::new(1, 0, 0));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let updater = BulkStockUpdater::new(Arc::new(RecordingStore::new()), 10);
        assert_eq!(updater.update_stock(&[]).await, Err(QueueError::EmptyBatch));
    }

    #[tokio::test]
    async fn test_failing_chunk_aborts_remaining_chunks() {
        let store = Arc::new(RecordingStore::new().failing_on_call(1));
        let updater = BulkStockUpdater::new(store.clone(), 1);

        let batch: Vec<_> = (1..=3)
            .map(|i| json!({"product_id": i, "warehouse_id": 1, "stock": 1}))
            .collect();
        let err = updater.update_stock(&batch).await.unwrap_err();

        assert!(matches!(err, QueueError::Store(StoreError::LockBusy { .. })));
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_chunks_before_a_failure_stay_on_disk() {
        let dir = tempdir().unwrap();
        let lots = JsonLotStore::new(dir.path().join("lots.json"), LockConfig::default());
        lots.persist(&[
            LotRecord::new(1, 1, 1, 0),
            LotRecord::new(2, 2, 1, 0),
            LotRecord::new(3, 3, 1, 0),
        ])
        .await
        .unwrap();
        let store = RecordingStore::new()
            .wrapping(Arc::new(lots.clone()))
            .failing_on_call(1);
        let updater = BulkStockUpdater::new(Arc::new(store), 1);

        let batch: Vec<_> = (1..=3)
            .map(|i| json!({"product_id": i, "warehouse_id": 1, "stock": i * 10}))
            .collect();
        let err = updater.update_stock(&batch).await.unwrap_err();
        assert!(matches!(err, QueueError::Store(StoreError::LockBusy { .. })));

        let stock: Vec<i64> = lots.load().await.unwrap().iter().map(|l| l.stock).collect();
        assert_eq!(stock, vec![10, 0, 0]);
    }
}
