use crate::domain::{
    Clock, DomainError, EventPublisher, FaceAnalysis, PhotoRepository, RequestContext, VisionClient,
};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Topic that upload notifications are published to.
pub const UPLOAD_TOPIC: &str = "image-upload-topic";

/// Photo ingestion and feed core. Shared by every request handler; the only
/// mutable state is the advisory `next_id` counter.
pub struct PhotoService {
    pub(crate) vision: Arc<dyn VisionClient>,
    pub(crate) publisher: Arc<dyn EventPublisher>,
    pub(crate) repo: Arc<dyn PhotoRepository>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) topic: String,
    next_id: AtomicI64,
}

impl PhotoService {
    /// Builds the service and seeds `next_id` from the store's highest id.
    pub async fn new(
        vision: Arc<dyn VisionClient>,
        publisher: Arc<dyn EventPublisher>,
        repo: Arc<dyn PhotoRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        let seed_repo = repo.clone();
        let highest = tokio::task::spawn_blocking(move || seed_repo.highest_id())
            .await
            .map_err(|e| DomainError::StoreUnavailable(format!("Store task failed: {}", e)))??;

        Ok(Self {
            vision,
            publisher,
            repo,
            clock,
            topic: UPLOAD_TOPIC.to_string(),
            next_id: AtomicI64::new(highest + 1),
        })
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Advisory next id. The store assigns the real one.
    pub fn next_id(&self) -> i64 {
        self.next_id.load(Ordering::SeqCst)
    }

    pub(crate) fn observe_id(&self, id: i64) {
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(0)
    }

    /// Runs a store call on the blocking pool under the request context.
    /// A call that already started keeps running if the context fires.
    pub(crate) async fn store<T, F>(&self, ctx: &RequestContext, f: F) -> Result<T, DomainError>
    where
        F: FnOnce(&dyn PhotoRepository) -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let repo = self.repo.clone();
        ctx.run(async move {
            tokio::task::spawn_blocking(move || f(repo.as_ref()))
                .await
                .map_err(|e| DomainError::StoreUnavailable(format!("Store task failed: {}", e)))?
        })
        .await
    }

    /// Fresh vision analysis reduced to its first face.
    pub(crate) async fn analyze_first_face(
        &self,
        ctx: &RequestContext,
        url: &str,
    ) -> Result<FaceAnalysis, DomainError> {
        let faces = ctx.run(self.vision.analyze_faces(url)).await?;
        faces.into_iter().next().ok_or(DomainError::NoFaceDetected)
    }
}

pub(crate) fn parse_id(raw: &str) -> Result<i64, DomainError> {
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        Ok(id) => Err(DomainError::InvalidInput(format!("id must be positive, got {}", id))),
        Err(_) => Err(DomainError::InvalidInput(format!("id is not an integer: {:?}", raw))),
    }
}

pub(crate) fn validate_url(raw: &str) -> Result<String, DomainError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(DomainError::InvalidInput("url must not be empty".to_string()));
    }
    Ok(url.to_string())
}
