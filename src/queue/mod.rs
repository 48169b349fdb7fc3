//! In-process queue that serializes bulk stock updates behind a single worker.

pub mod handle;
pub mod state;
pub mod worker;

pub use handle::*;
pub use state::*;
pub use worker::*;
