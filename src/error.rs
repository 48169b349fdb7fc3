use thiserror::Error;

/// Failures of the lot collection's backing store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Lock file is already being held: {path} (gave up after {attempts} attempts)")]
    LockBusy { path: String, attempts: u32 },
    #[error("Lot store I/O error: {0}")]
    Io(String),
    #[error("Lot store serialization error: {0}")]
    Serialization(String),
    #[error("Error releasing the lock: {0}")]
    LockRelease(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Failures surfaced to a caller of the stock update queue.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueueError {
    #[error("Service is shutting down, not accepting new requests")]
    NotAccepting,
    #[error("Service is shutting down")]
    ShuttingDown,
    #[error("The body must be an array with at least one element")]
    EmptyBatch,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Queue worker dropped the request")]
    WorkerGone,
    #[error("Batch processing panicked: {0}")]
    Panicked(String),
}

/// Why the validator dropped an update. Logged, never returned to callers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("update must be an object")]
    NotAnObject,
    #[error("\"{0}\" is required")]
    Missing(&'static str),
    #[error("\"{0}\" must be an integer")]
    NotAnInteger(&'static str),
    #[error("\"stock\" must be greater than or equal to 0")]
    NegativeStock,
    #[error("\"{0}\" is not allowed")]
    UnknownField(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
