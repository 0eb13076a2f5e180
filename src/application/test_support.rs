use crate::domain::{
    Clock, DomainError, EventPublisher, FaceAnalysis, NewPhoto, PhotoRecord, PhotoRepository,
    VisionClient,
};
use crate::infrastructure::SqliteRepository;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

/// Vision client returning a canned response and recording requested urls.
pub struct FakeVision {
    response: Mutex<Result<Vec<FaceAnalysis>, DomainError>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeVision {
    pub fn returning(faces: Vec<FaceAnalysis>) -> Self {
        Self {
            response: Mutex::new(Ok(faces)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: DomainError) -> Self {
        Self {
            response: Mutex::new(Err(err)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, response: Result<Vec<FaceAnalysis>, DomainError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VisionClient for FakeVision {
    async fn analyze_faces(&self, url: &str) -> Result<Vec<FaceAnalysis>, DomainError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.response.lock().unwrap().clone()
    }
}

/// Vision client that never answers.
pub struct HangingVision;

#[async_trait]
impl VisionClient for HangingVision {
    async fn analyze_faces(&self, _url: &str) -> Result<Vec<FaceAnalysis>, DomainError> {
        std::future::pending::<Result<Vec<FaceAnalysis>, DomainError>>().await
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub messages: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.fail.store(true, Ordering::SeqCst);
        publisher
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, text: &str) -> Result<(), DomainError> {
        self.messages
            .lock()
            .unwrap()
            .push((topic.to_string(), text.to_string()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::PublishFailed("broker down".to_string()));
        }
        Ok(())
    }
}

/// Clock pinned to a settable Unix second.
pub struct FixedClock {
    secs: AtomicI64,
}

impl FixedClock {
    pub fn at(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.secs.load(Ordering::SeqCst), 0).unwrap()
    }
}

/// Store whose reads go to a real repository and whose writes fail.
pub struct FailingWrites {
    inner: SqliteRepository,
    err: DomainError,
}

impl FailingWrites {
    pub fn new(inner: SqliteRepository, err: DomainError) -> Self {
        Self { inner, err }
    }
}

impl PhotoRepository for FailingWrites {
    fn highest_id(&self) -> Result<i64, DomainError> {
        self.inner.highest_id()
    }

    fn insert(&self, _photo: &NewPhoto) -> Result<i64, DomainError> {
        Err(self.err.clone())
    }

    fn get_by_id(&self, id: i64) -> Result<PhotoRecord, DomainError> {
        self.inner.get_by_id(id)
    }

    fn list_all(&self) -> Result<Vec<PhotoRecord>, DomainError> {
        self.inner.list_all()
    }

    fn update(&self, _record: &PhotoRecord) -> Result<(), DomainError> {
        Err(self.err.clone())
    }
}
