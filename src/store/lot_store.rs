use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use super::lock::{FileLock, LockConfig};
use crate::domain::{LotKey, LotRecord, StockUpdate};
use crate::error::StoreError;

/// Applies stock overwrites to the shared lot collection.
///
/// An implementation must exclude every other writer of the collection for the
/// duration of one `apply` call and return only the lots it matched and changed.
#[async_trait]
pub trait LotStore: Send + Sync + 'static {
    async fn apply(&self, chunk: &[StockUpdate]) -> Result<Vec<LotRecord>, StoreError>;
}

/// Lot collection kept as a JSON array in one file.
#[derive(Debug, Clone)]
pub struct JsonLotStore {
    path: PathBuf,
    lock: LockConfig,
}

enum Slot {
    Unique(usize),
    Ambiguous,
}

impl JsonLotStore {
    pub fn new(path: impl Into<PathBuf>, lock: LockConfig) -> Self {
        Self {
            path: path.into(),
            lock,
        }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole collection. A missing or blank file is an empty collection.
    pub async fn load(&self) -> Result<Vec<LotRecord>, StoreError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    /// Replaces the whole collection on disk via write-then-rename.
    pub async fn persist(&self, lots: &[LotRecord]) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(lots)?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn apply_unlocked(&self, chunk: &[StockUpdate]) -> Result<Vec<LotRecord>, StoreError> {
        let mut lots = self.load().await?;
        let index = build_index(&lots);

        let mut updated = Vec::new();
        for update in chunk {
            if let Some(Slot::Unique(i)) = index.get(&update.key()) {
                let lot = &mut lots[*i];
                lot.stock = update.stock;
                lot.updated_at = Some(Utc::now());
                updated.push(lot.clone());
            }
        }

        self.persist(&lots).await?;
        Ok(updated)
    }
}

/// Indexes active lots by composite key. Keys shared by several active lots
/// are marked ambiguous and never matched.
fn build_index(lots: &[LotRecord]) -> HashMap<LotKey, Slot> {
    let mut index = HashMap::with_capacity(lots.len());
    let mut duplicates: HashMap<LotKey, Vec<i64>> = HashMap::new();

    for (i, lot) in lots.iter().enumerate().filter(|(_, lot)| lot.is_active()) {
        let key = lot.key();
        match index.insert(key, Slot::Ambiguous) {
            None => {
                index.insert(key, Slot::Unique(i));
            }
            Some(Slot::Unique(first)) => {
                duplicates.insert(key, vec![lots[first].id, lot.id]);
            }
            Some(Slot::Ambiguous) => {
                duplicates.entry(key).or_default().push(lot.id);
            }
        }
    }

    for (key, ids) in duplicates {
        warn!(
            product_id = key.product_id,
            warehouse_id = key.warehouse_id,
            lot_ids = ?ids,
            "Several active lots share a product and warehouse; skipping them"
        );
    }
    index
}

#[async_trait]
impl LotStore for JsonLotStore {
    #[instrument(name = "apply_chunk", skip(self, chunk), fields(chunk_size = chunk.len()))]
    async fn apply(&self, chunk: &[StockUpdate]) -> Result<Vec<LotRecord>, StoreError> {
        let lock = if tokio::fs::try_exists(&self.path).await? {
            Some(FileLock::acquire(&self.path, &self.lock).await?)
        } else {
            debug!(path = %self.path.display(), "Lot collection does not exist yet, writing without lock");
            None
        };

        let outcome = self.apply_unlocked(chunk).await;

        if let Some(lock) = lock {
            if let Err(e) = lock.release().await {
                error!(error = %e, "Error releasing the lock");
            }
        }

        match &outcome {
            Ok(updated) => info!(updated = updated.len(), "Chunk applied"),
            Err(e) => error!(error = %e, "Chunk failed"),
        }
        outcome
    }
}
