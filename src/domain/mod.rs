pub mod lot;
pub mod stock_update;

pub use lot::*;
pub use stock_update::*;
