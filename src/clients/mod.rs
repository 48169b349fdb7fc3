pub mod stock_client;

pub use stock_client::*;
