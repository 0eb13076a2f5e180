pub mod clock;
pub mod google_vision;
pub mod kafka_publisher;
pub mod sqlite_repo;

pub use clock::*;
pub use google_vision::*;
pub use kafka_publisher::*;
pub use sqlite_repo::*;
