//! Validation, chunking and the bulk stock update use case.

pub mod bulk_update;
pub mod chunk;
pub mod validator;

pub use bulk_update::*;
pub use chunk::chunk;
pub use validator::*;
