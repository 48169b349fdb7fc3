use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{oneshot, Notify};

use crate::domain::{BulkUpdateResult, RawStockUpdate};
use crate::error::QueueError;

pub type UpdateResponse = oneshot::Sender<Result<BulkUpdateResult, QueueError>>;

/// A batch waiting in the queue together with the sink for its outcome.
#[derive(Debug)]
pub struct QueueItem {
    pub updates: Vec<RawStockUpdate>,
    pub respond_to: UpdateResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueLifecycle {
    Stopped,
    Running,
    Draining,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueMetrics {
    pub pending_updates_count: usize,
    pub total_processed: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub queue_size: usize,
    pub is_processing: bool,
    pub is_active: bool,
    pub metrics: QueueMetrics,
}

#[derive(Debug)]
pub(crate) struct QueueState {
    pub items: VecDeque<QueueItem>,
    pub lifecycle: QueueLifecycle,
    pub processing: bool,
    pub metrics: QueueMetrics,
}

impl QueueState {
    pub fn record(&mut self, succeeded: bool) {
        self.processing = false;
        self.metrics.total_processed += 1;
        if succeeded {
            self.metrics.success_count += 1;
        } else {
            self.metrics.error_count += 1;
        }
        self.metrics.last_processed_at = Some(Utc::now());
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            queue_size: self.items.len(),
            is_processing: self.processing,
            is_active: self.lifecycle == QueueLifecycle::Running,
            metrics: QueueMetrics {
                pending_updates_count: self.items.iter().map(|item| item.updates.len()).sum(),
                ..self.metrics.clone()
            },
        }
    }
}

/// State shared by the worker and every handle. The worker is woken through
/// `wake` whenever an item is pushed or shutdown is requested.
#[derive(Debug)]
pub(crate) struct Shared {
    pub state: Mutex<QueueState>,
    pub wake: Notify,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                lifecycle: QueueLifecycle::Stopped,
                processing: false,
                metrics: QueueMetrics::default(),
            }),
            wake: Notify::new(),
        }
    }
}
