use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::UPLOAD_TOPIC;
use crate::infrastructure::DEFAULT_VISION_ENDPOINT;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

// Aliases cover sources that lowercase their keys (environment variables).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub vision: VisionConfig,
    #[serde(alias = "messagebus")]
    pub message_bus: MessageBusConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionConfig {
    /// Service-account document used to mint access tokens.
    #[serde(default, alias = "credentialsfile")]
    pub credentials_file: Option<PathBuf>,
    #[serde(default, alias = "apikey")]
    pub api_key: Option<String>,
    #[serde(default = "default_vision_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBusConfig {
    /// Kafka bootstrap servers, `host:port`.
    pub endpoint: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_request_timeout_secs", alias = "requesttimeoutsecs")]
    pub request_timeout_secs: u64,
}

fn default_vision_endpoint() -> String {
    DEFAULT_VISION_ENDPOINT.to_string()
}

fn default_topic() -> String {
    UPLOAD_TOPIC.to_string()
}

fn default_database_path() -> String {
    "photos.db".to_string()
}

fn default_bind() -> String {
    "0.0.0.0:50051".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Reads the file at `path`, then `PHOTOFEED_*` environment overrides
    /// (`__` separates nesting levels).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("PHOTOFEED").separator("__"))
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.vision.credentials_file.is_none() && self.vision.api_key.is_none() {
            return Err(ConfigError::Message(
                "vision.credentialsFile or vision.apiKey must be set".to_string(),
            ));
        }
        if self.message_bus.endpoint.trim().is_empty() {
            return Err(ConfigError::Message(
                "messageBus.endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_minimal_file_with_defaults() {
        let (_dir, path) = write_config(
            "vision:\n  credentialsFile: config/sa.json\nmessageBus:\n  endpoint: localhost:9092\n",
        );

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.vision.credentials_file, Some(PathBuf::from("config/sa.json")));
        assert_eq!(cfg.vision.endpoint, DEFAULT_VISION_ENDPOINT);
        assert_eq!(cfg.message_bus.endpoint, "localhost:9092");
        assert_eq!(cfg.message_bus.topic, UPLOAD_TOPIC);
        assert_eq!(cfg.database.path, "photos.db");
        assert_eq!(cfg.server.bind, "0.0.0.0:50051");
        assert_eq!(cfg.server.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn loads_overrides() {
        let (_dir, path) = write_config(
            "vision:\n  apiKey: abc\n  endpoint: http://127.0.0.1:9000\n\
             messageBus:\n  endpoint: kafka:9092\n  topic: uploads\n\
             database:\n  path: /tmp/p.db\n\
             server:\n  bind: 127.0.0.1:8080\n  requestTimeoutSecs: 5\n",
        );

        let cfg = AppConfig::load(&path).unwrap();
        assert_eq!(cfg.vision.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.vision.endpoint, "http://127.0.0.1:9000");
        assert_eq!(cfg.message_bus.topic, "uploads");
        assert_eq!(cfg.database.path, "/tmp/p.db");
        assert_eq!(cfg.server.request_timeout_secs, 5);
    }

    #[test]
    fn requires_vision_credentials() {
        let (_dir, path) = write_config("vision: {}\nmessageBus:\n  endpoint: localhost:9092\n");
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn requires_message_bus() {
        let (_dir, path) = write_config("vision:\n  apiKey: abc\n");
        assert!(AppConfig::load(&path).is_err());
    }
}
