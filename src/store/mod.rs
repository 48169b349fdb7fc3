//! Persistence of the lot collection and the lock that guards it.

pub mod lock;
pub mod lot_store;

pub use lock::*;
pub use lot_store::*;
