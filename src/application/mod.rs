pub mod detail;
pub mod feed;
pub mod service;
pub mod update;
pub mod upload;
#[cfg(test)]
pub(crate) mod test_support;

pub use feed::*;
pub use service::{PhotoService, UPLOAD_TOPIC};
