//! System orchestration, startup, and shutdown logic.

pub mod config;
pub mod stock_system;
pub mod tracing;

pub use config::*;
pub use stock_system::*;
pub use self::tracing::setup_tracing;
