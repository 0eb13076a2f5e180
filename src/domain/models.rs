use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dominant emotion inferred for a single detected face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Joy,
    Sorrow,
    Anger,
    Surprise,
    Unknown,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "Joy",
            Emotion::Sorrow => "Sorrow",
            Emotion::Anger => "Anger",
            Emotion::Surprise => "Surprise",
            Emotion::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Joy" => Ok(Emotion::Joy),
            "Sorrow" => Ok(Emotion::Sorrow),
            "Anger" => Ok(Emotion::Anger),
            "Surprise" => Ok(Emotion::Surprise),
            "Unknown" => Ok(Emotion::Unknown),
            other => Err(format!("unknown emotion label: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceAnalysis {
    pub emotion: Emotion,
    /// Detector confidence in [0.0, 1.0].
    pub confidence: f32,
}

impl FaceAnalysis {
    pub fn new(emotion: Emotion, confidence: f32) -> Self {
        Self { emotion, confidence }
    }
}

/// A persisted photo row. `face` is `None` exactly when both the emotion and
/// confidence columns are NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub id: i64,
    pub url: String,
    pub face: Option<FaceAnalysis>,
    pub upload_time: DateTime<Utc>,
}

impl PhotoRecord {
    /// Confidence used as the secondary feed key; 0 when no face was stored.
    pub fn avg_confidence(&self) -> f32 {
        self.face.map(|f| f.confidence).unwrap_or(0.0)
    }
}

/// A photo row that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub url: String,
    pub face: Option<FaceAnalysis>,
    pub upload_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAnalysisDto {
    pub emotion: String,
    pub confidence: f32,
}

impl From<FaceAnalysis> for FaceAnalysisDto {
    fn from(face: FaceAnalysis) -> Self {
        Self {
            emotion: face.emotion.to_string(),
            confidence: face.confidence,
        }
    }
}

/// Request/response shape of the image operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    #[serde(default)]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub face_analysis: Vec<FaceAnalysisDto>,
    /// Seconds since the Unix epoch; 0 on create.
    #[serde(default)]
    pub upload_time: i64,
}

impl From<PhotoRecord> for UploadedImage {
    fn from(record: PhotoRecord) -> Self {
        Self {
            id: record.id.to_string(),
            url: record.url,
            face_analysis: record.face.into_iter().map(FaceAnalysisDto::from).collect(),
            upload_time: record.upload_time.timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRequest {
    #[serde(default)]
    pub page_size: i32,
    #[serde(default)]
    pub page_number: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedResponse {
    pub images: Vec<UploadedImage>,
}
