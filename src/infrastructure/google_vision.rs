use crate::domain::{DomainError, Emotion, FaceAnalysis, VisionClient};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Cached tokens are refreshed this long before the provider says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Fields of a Google service-account document needed to mint access tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone)]
pub enum VisionAuth {
    ApiKey(String),
    ServiceAccount(ServiceAccountKey),
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateBatch<'a> {
    requests: [AnnotateRequest<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateRequest<'a> {
    image: ImageRef<'a>,
    features: [Feature; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRef<'a> {
    source: ImageSource<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSource<'a> {
    image_uri: &'a str,
}

#[derive(Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct AnnotateBatchResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    face_annotations: Vec<FaceAnnotation>,
    error: Option<ProviderStatus>,
}

#[derive(Deserialize)]
struct ProviderStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FaceAnnotation {
    pub detection_confidence: Option<f32>,
    #[serde(default)]
    pub joy_likelihood: String,
    #[serde(default)]
    pub sorrow_likelihood: String,
    #[serde(default)]
    pub anger_likelihood: String,
    #[serde(default)]
    pub surprise_likelihood: String,
}

fn is_likely(likelihood: &str) -> bool {
    matches!(likelihood, "LIKELY" | "VERY_LIKELY")
}

/// First of joy, sorrow, anger, surprise that is at least LIKELY.
pub(crate) fn determine_emotion(face: &FaceAnnotation) -> Emotion {
    [
        (&face.joy_likelihood, Emotion::Joy),
        (&face.sorrow_likelihood, Emotion::Sorrow),
        (&face.anger_likelihood, Emotion::Anger),
        (&face.surprise_likelihood, Emotion::Surprise),
    ]
    .into_iter()
    .find(|(likelihood, _)| is_likely(likelihood))
    .map(|(_, emotion)| emotion)
    .unwrap_or(Emotion::Unknown)
}

pub(crate) fn detection_confidence(face: &FaceAnnotation) -> f32 {
    match face.detection_confidence {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Face detection through the Cloud Vision `images:annotate` REST endpoint.
pub struct GoogleVisionClient {
    client: Client,
    base_url: String,
    auth: VisionAuth,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleVisionClient {
    pub fn new(auth: VisionAuth, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        let client = Client::builder()
            .user_agent(concat!("photofeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            token: Mutex::new(None),
        }
    }

    /// Binds the service-account document at `path`.
    pub fn from_credentials_file(
        path: impl AsRef<Path>,
        base_url: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DomainError::VisionUnavailable(format!(
                "Failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            DomainError::VisionUnavailable(format!("Invalid credentials file: {}", e))
        })?;
        Ok(Self::new(VisionAuth::ServiceAccount(key), base_url))
    }

    async fn access_token(&self, key: &ServiceAccountKey) -> Result<String, DomainError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &key.client_email,
            scope: SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DomainError::VisionUnavailable(format!("Invalid private key: {}", e)))?;
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
            .map_err(|e| DomainError::VisionUnavailable(format!("Failed to sign assertion: {}", e)))?;

        let res = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| DomainError::VisionUnavailable(format!("Token request failed: {}", e)))?;

        if !res.status().is_success() {
            return Err(DomainError::VisionUnavailable(format!(
                "Token request failed with status {}",
                res.status()
            )));
        }

        let token: TokenResponse = res
            .json()
            .await
            .map_err(|e| DomainError::VisionUnavailable(format!("Invalid token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl VisionClient for GoogleVisionClient {
    async fn analyze_faces(&self, url: &str) -> Result<Vec<FaceAnalysis>, DomainError> {
        let body = AnnotateBatch {
            requests: [AnnotateRequest {
                image: ImageRef {
                    source: ImageSource { image_uri: url },
                },
                features: [Feature { kind: "FACE_DETECTION" }],
            }],
        };

        let request = self
            .client
            .post(format!("{}/v1/images:annotate", self.base_url))
            .json(&body);
        let request = match &self.auth {
            VisionAuth::ApiKey(key) => request.query(&[("key", key)]),
            VisionAuth::ServiceAccount(sa) => request.bearer_auth(self.access_token(sa).await?),
        };

        debug!("Requesting face detection for {}", url);
        let res = request
            .send()
            .await
            .map_err(|e| DomainError::VisionUnavailable(format!("Request failed: {}", e)))?;

        let status = res.status();
        if status == StatusCode::BAD_REQUEST {
            let text = res.text().await.unwrap_or_default();
            return Err(DomainError::VisionRejected(format!("Provider returned 400: {}", text)));
        }
        if !status.is_success() {
            return Err(DomainError::VisionUnavailable(format!(
                "Provider returned status {}",
                status
            )));
        }

        let batch: AnnotateBatchResponse = res.json().await.map_err(|e| {
            DomainError::VisionUnavailable(format!("Failed to parse provider response: {}", e))
        })?;

        let Some(image) = batch.responses.into_iter().next() else {
            return Ok(Vec::new());
        };
        if let Some(err) = image.error {
            if err.code != 0 {
                return Err(DomainError::VisionRejected(format!(
                    "code {}: {}",
                    err.code, err.message
                )));
            }
        }

        let faces: Vec<FaceAnalysis> = image
            .face_annotations
            .iter()
            .map(|face| FaceAnalysis {
                emotion: determine_emotion(face),
                confidence: detection_confidence(face),
            })
            .collect();
        debug!("Provider found {} face(s) in {}", faces.len(), url);
        Ok(faces)
    }
}
