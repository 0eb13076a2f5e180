pub mod context;
pub mod models;
pub mod ports;

pub use context::*;
pub use models::*;
pub use ports::*;
