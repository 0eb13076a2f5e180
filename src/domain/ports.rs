use super::models::{FaceAnalysis, NewPhoto, PhotoRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Photo not found")]
    NotFound,
    #[error("No face detected in image")]
    NoFaceDetected,
    #[error("Vision provider unavailable: {0}")]
    VisionUnavailable(String),
    #[error("Vision provider rejected the image: {0}")]
    VisionRejected(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Store constraint violated: {0}")]
    StoreConstraint(String),
    #[error("Publish failed: {0}")]
    PublishFailed(String),
    #[error("Operation canceled")]
    Canceled,
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl From<rusqlite::Error> for DomainError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => DomainError::NotFound,
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                DomainError::StoreConstraint(err.to_string())
            }
            other => DomainError::StoreUnavailable(other.to_string()),
        }
    }
}

/// Durable id -> photo mapping. Calls are synchronous; the service moves them
/// onto the blocking pool.
pub trait PhotoRepository: Send + Sync {
    /// Current maximum id, or 0 for an empty store.
    fn highest_id(&self) -> Result<i64, DomainError>;
    /// Inserts the row and returns its id, strictly greater than any id
    /// returned before.
    fn insert(&self, photo: &NewPhoto) -> Result<i64, DomainError>;
    fn get_by_id(&self, id: i64) -> Result<PhotoRecord, DomainError>;
    fn list_all(&self) -> Result<Vec<PhotoRecord>, DomainError>;
    fn update(&self, record: &PhotoRecord) -> Result<(), DomainError>;
}

#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Face analyses for the image at `url`, in provider order.
    async fn analyze_faces(&self, url: &str) -> Result<Vec<FaceAnalysis>, DomainError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hands `text` to the bus for `topic`. Success means the bus accepted
    /// the message for buffering, not that anyone consumed it.
    async fn publish(&self, topic: &str, text: &str) -> Result<(), DomainError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
