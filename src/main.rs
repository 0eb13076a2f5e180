mod application;
mod domain;
mod infrastructure;
mod presentation;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use application::PhotoService;
use domain::VisionClient;
use infrastructure::{GoogleVisionClient, KafkaPublisher, SqliteRepository, SystemClock, VisionAuth};
use presentation::{app_router, AppState};
use settings::{AppConfig, VisionConfig, DEFAULT_CONFIG_PATH};

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

fn build_vision(cfg: &VisionConfig) -> Result<GoogleVisionClient, domain::DomainError> {
    match (&cfg.api_key, &cfg.credentials_file) {
        (Some(key), _) => Ok(GoogleVisionClient::new(
            VisionAuth::ApiKey(key.clone()),
            cfg.endpoint.clone(),
        )),
        (None, Some(path)) => GoogleVisionClient::from_credentials_file(path, cfg.endpoint.clone()),
        (None, None) => Err(domain::DomainError::InvalidInput(
            "no vision credentials configured".to_string(),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configuration
    let config_path = PathBuf::from(
        std::env::var("PHOTOFEED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
    );
    info!("Loading configuration from {}", config_path.display());
    let cfg = AppConfig::load(&config_path)?;

    // Infrastructure
    let repo = Arc::new(SqliteRepository::new(&cfg.database.path)?);
    let vision: Arc<dyn VisionClient> = Arc::new(build_vision(&cfg.vision)?);
    let publisher = Arc::new(KafkaPublisher::new(&cfg.message_bus.endpoint)?);

    let service = PhotoService::new(vision, publisher, repo, Arc::new(SystemClock))
        .await?
        .with_topic(cfg.message_bus.topic.clone());
    info!("Photo service ready, next id {}", service.next_id());

    let shutdown = CancellationToken::new();
    let state = AppState {
        service: Arc::new(service),
        shutdown: shutdown.clone(),
        request_timeout: cfg.server.request_timeout(),
    };

    let app = Router::new()
        .nest("/api", app_router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&cfg.server.bind).await?;
    info!("Server running on http://{}", cfg.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested, cancelling in-flight requests");
            }
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
