use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::application::PhotoService;
use crate::domain::{DomainError, FeedRequest, FeedResponse, RequestContext, UploadedImage};

// App State
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PhotoService>,
    /// Parent of every request token; cancelled on shutdown.
    pub shutdown: CancellationToken,
    pub request_timeout: Duration,
}

impl AppState {
    fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.shutdown.child_token(), self.request_timeout)
    }
}

#[derive(Deserialize)]
pub struct UrlBody {
    pub url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub page_size: Option<i32>,
    pub page_number: Option<i32>,
}

async fn upload_handler(
    State(state): State<AppState>,
    Json(body): Json<UrlBody>,
) -> Result<(StatusCode, Json<UploadedImage>), DomainError> {
    let ctx = state.request_context();
    let req = UploadedImage {
        url: body.url,
        ..Default::default()
    };
    let image = state.service.upload(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn detail_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UploadedImage>, DomainError> {
    let ctx = state.request_context();
    let req = UploadedImage {
        id,
        ..Default::default()
    };
    Ok(Json(state.service.get_detail(&ctx, req).await?))
}

async fn feed_handler(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, DomainError> {
    let ctx = state.request_context();
    let req = FeedRequest {
        page_size: query.page_size.unwrap_or(0),
        page_number: query.page_number.unwrap_or(0),
    };
    Ok(Json(state.service.feed(&ctx, req).await?))
}

async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UrlBody>,
) -> Result<Json<UploadedImage>, DomainError> {
    let ctx = state.request_context();
    let req = UploadedImage {
        id,
        url: body.url,
        ..Default::default()
    };
    Ok(Json(state.service.update_detail(&ctx, req).await?))
}

// Error handling
impl IntoResponse for DomainError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            DomainError::InvalidInput(_) | DomainError::NotFound | DomainError::NoFaceDetected => {}
            DomainError::VisionRejected(e) => warn!("Vision rejected image: {}", e),
            DomainError::Canceled | DomainError::DeadlineExceeded => warn!("Request aborted: {}", self),
            DomainError::VisionUnavailable(e) => error!("Vision Error: {}", e),
            DomainError::StoreUnavailable(e) => error!("Store Error: {}", e),
            DomainError::StoreConstraint(e) => error!("Store Constraint Error: {}", e),
            DomainError::PublishFailed(e) => error!("Publish Error: {}", e),
        }

        let (status, message) = match self {
            DomainError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            DomainError::NotFound => (StatusCode::NOT_FOUND, "Photo not found".to_string()),
            DomainError::NoFaceDetected => {
                (StatusCode::UNPROCESSABLE_ENTITY, "No face detected".to_string())
            }
            DomainError::VisionRejected(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "Image rejected by vision provider".to_string())
            }
            DomainError::VisionUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, "Vision provider unavailable".to_string())
            }
            DomainError::StoreConstraint(_) => (StatusCode::CONFLICT, "Store constraint violated".to_string()),
            DomainError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "Store error".to_string()),
            DomainError::Canceled => (StatusCode::SERVICE_UNAVAILABLE, "Request canceled".to_string()),
            DomainError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "Deadline exceeded".to_string()),
            DomainError::PublishFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Publish error".to_string()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/images", get(feed_handler).post(upload_handler))
        .route("/images/{id}", get(detail_handler).put(update_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{FakeVision, FixedClock, RecordingPublisher};
    use crate::domain::{Emotion, FaceAnalysis};
    use crate::infrastructure::TestDb;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    async fn router(name: &str, faces: Vec<FaceAnalysis>) -> (TestDb, Router) {
        let db = TestDb::new(name);
        let service = PhotoService::new(
            Arc::new(FakeVision::returning(faces)),
            Arc::new(RecordingPublisher::default()),
            Arc::new(db.reopen()),
            Arc::new(FixedClock::at(1_700_000_000)),
        )
        .await
        .unwrap();
        let state = AppState {
            service: Arc::new(service),
            shutdown: CancellationToken::new(),
            request_timeout: Duration::from_secs(5),
        };
        (db, app_router(state))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_then_feed_and_detail() {
        let (_db, app) = router("api_flow", vec![FaceAnalysis::new(Emotion::Joy, 0.5)]).await;

        let (status, body) = send(&app, json_request("POST", "/images", json!({ "url": "http://x/a" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "1");
        assert_eq!(body["faceAnalysis"][0]["emotion"], "Joy");
        assert_eq!(body["uploadTime"], 1_700_000_000i64);

        let (status, body) = send(
            &app,
            Request::get("/images?pageSize=5&pageNumber=1").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["images"].as_array().unwrap().len(), 1);

        let (status, body) = send(&app, Request::get("/images/1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "http://x/a");
    }

    #[tokio::test]
    async fn update_rewrites_url() {
        let (_db, app) = router("api_update", vec![FaceAnalysis::new(Emotion::Anger, 0.4)]).await;
        send(&app, json_request("POST", "/images", json!({ "url": "http://x/a" }))).await;

        let (status, body) = send(&app, json_request("PUT", "/images/1", json!({ "url": "http://x/b" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "http://x/b");
        assert_eq!(body["faceAnalysis"][0]["emotion"], "Anger");
    }

    #[tokio::test]
    async fn errors_map_to_status_codes() {
        let (_db, app) = router("api_errors", vec![]).await;

        let (status, body) = send(&app, Request::get("/images/42").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, Request::get("/images/abc").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, json_request("POST", "/images", json!({ "url": "http://x/a" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(&app, json_request("POST", "/images", json!({ "url": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn shutdown_cancels_requests() {
        let db = TestDb::new("api_shutdown");
        let service = PhotoService::new(
            Arc::new(FakeVision::returning(vec![FaceAnalysis::new(Emotion::Joy, 0.5)])),
            Arc::new(RecordingPublisher::default()),
            Arc::new(db.reopen()),
            Arc::new(FixedClock::at(0)),
        )
        .await
        .unwrap();
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let app = app_router(AppState {
            service: Arc::new(service),
            shutdown,
            request_timeout: Duration::from_secs(5),
        });

        let (status, _) = send(&app, json_request("POST", "/images", json!({ "url": "http://x/a" }))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn internal_errors_do_not_echo_detail() {
        let cases = [
            (
                DomainError::StoreUnavailable("no such table: photos (/var/lib/photofeed/photos.db)".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "Store error",
            ),
            (
                DomainError::StoreConstraint("UNIQUE constraint failed: photos.id".into()),
                StatusCode::CONFLICT,
                "Store constraint violated",
            ),
            (
                DomainError::VisionUnavailable("Failed to read credentials file /etc/key.json".into()),
                StatusCode::BAD_GATEWAY,
                "Vision provider unavailable",
            ),
            (
                DomainError::PublishFailed("broker localhost:9092 down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "Publish error",
            ),
        ];

        for (err, expected_status, expected_message) in cases {
            let res = err.into_response();
            assert_eq!(res.status(), expected_status);
            let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["error"], expected_message);
        }
    }

    #[tokio::test]
    async fn invalid_input_keeps_its_message() {
        let res = DomainError::InvalidInput("url must not be empty".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "url must not be empty");
    }
}
