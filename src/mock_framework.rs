//! # Mock Framework
//!
//! Instrumented [`LotStore`] doubles for testing the queue and the bulk update
//! use case without touching disk.
//!
//! [`RecordingStore`] remembers every chunk it was asked to apply, counts how
//! many `apply` calls overlap in time, and can be told to fail, to hold each
//! call behind a gate, or to treat some composite keys as unknown lots. It can
//! also forward to a real store so a failure lands between real writes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::domain::{LotKey, LotRecord, StockUpdate};
use crate::error::StoreError;
use crate::store::LotStore;

#[derive(Default)]
pub struct RecordingStore {
    calls: Mutex<Vec<Vec<StockUpdate>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    missing: HashSet<LotKey>,
    fail_on_call: Option<usize>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    inner: Option<Arc<dyn LotStore>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates for this key match no lot.
    pub fn with_missing(mut self, product_id: i64, warehouse_id: i64) -> Self {
        self.missing.insert(LotKey { product_id, warehouse_id });
        self
    }

    /// The `n`th call (zero based) fails with a lock contention error.
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call waits for one permit on `gate` before doing anything.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Calls that do not fail are applied by `inner` instead of being faked.
    pub fn wrapping(mut self, inner: Arc<dyn LotStore>) -> Self {
        self.inner = Some(inner);
        self
    }

    pub fn calls(&self) -> Vec<Vec<StockUpdate>> {
        self.calls.lock().clone()
    }

    /// Highest number of `apply` calls that were in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LotStore for RecordingStore {
    async fn apply(&self, chunk: &[StockUpdate]) -> Result<Vec<LotRecord>, StoreError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let call = {
            let mut calls = self.calls.lock();
            calls.push(chunk.to_vec());
            calls.len() - 1
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on_call == Some(call) {
            return Err(StoreError::LockBusy {
                path: "mock".to_string(),
                attempts: 4,
            });
        }
        if let Some(inner) = &self.inner {
            return inner.apply(chunk).await;
        }
        Ok(chunk
            .iter()
            .filter(|u| !self.missing.contains(&u.key()))
            .enumerate()
            .map(|(i, u)| LotRecord::new(i as i64 + 1, u.product_id, u.warehouse_id, u.stock))
            .collect())
    }
}
