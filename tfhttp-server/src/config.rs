//! Application configuration
//!
//! Settings come from an optional TOML file merged with `TFHTTP_`-prefixed
//! environment variables; the environment wins.

use serde::Deserialize;
use thiserror::Error;

use tfhttp_state::{BackendSettings, MinioSettings};

/// Bucket used when the deployment does not name one
pub const DEFAULT_MINIO_BUCKET: &str = "e1cc89bb-b9f5-4b29-8163-c3e8da21bbba";

/// Errors raised while loading or validating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file or environment sources could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(String),

    /// The configuration loaded but does not make sense
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The application configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The log level
    pub log_level: String,
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Username for HTTP basic authentication
    pub username: Option<String>,
    /// Password for HTTP basic authentication
    pub password: Option<String>,
    /// The remote backend used for storing state blobs
    pub storage_backend: String,
    /// The remote backend used for state locking
    pub lock_backend: String,
    /// The MinIO host
    pub minio_host: String,
    /// Whether to reach MinIO over https
    pub minio_secure: bool,
    /// Region name passed to the MinIO client
    pub minio_region: String,
    /// Bucket in the MinIO storage
    pub minio_bucket: String,
    /// The MinIO access key
    pub minio_access_key: Option<String>,
    /// The MinIO secret key
    pub minio_secret_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bind_addr: "127.0.0.1:8080".to_string(),
            username: None,
            password: None,
            storage_backend: "minio".to_string(),
            lock_backend: "minio".to_string(),
            minio_host: "play.min.io".to_string(),
            minio_secure: true,
            minio_region: "us-east-1".to_string(),
            minio_bucket: DEFAULT_MINIO_BUCKET.to_string(),
            minio_access_key: None,
            minio_secret_key: None,
        }
    }
}

impl Config {
    /// Read the configuration from `path` and the environment
    ///
    /// A missing file is fine; the server can be configured entirely via
    /// `TFHTTP_*` environment variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(::config::Environment::with_prefix("TFHTTP").try_parsing(true))
            .build()
            .map_err(|err| ConfigError::Load(err.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|err| ConfigError::Load(err.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Check that 'username' and 'password' are set together or left empty
    fn validate(&self) -> Result<(), ConfigError> {
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::Invalid(
                "Both 'username' and 'password' must be set together or left empty.".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the backend settings for [`tfhttp_state::create_backends`]
    pub fn backend_settings(&self) -> Result<BackendSettings, ConfigError> {
        let needs_minio = self.storage_backend == "minio" || self.lock_backend == "minio";

        let minio = if needs_minio {
            Some(MinioSettings {
                host: self.minio_host.clone(),
                secure: self.minio_secure,
                region: self.minio_region.clone(),
                bucket: self.minio_bucket.clone(),
                access_key: self.required(&self.minio_access_key, "minio_access_key")?,
                secret_key: self.required(&self.minio_secret_key, "minio_secret_key")?,
            })
        } else {
            None
        };

        Ok(BackendSettings {
            storage_backend: self.storage_backend.clone(),
            lock_backend: self.lock_backend.clone(),
            minio,
        })
    }

    fn required(&self, value: &Option<String>, name: &str) -> Result<String, ConfigError> {
        value
            .clone()
            .ok_or_else(|| ConfigError::Invalid(format!("'{name}' is required for the minio backend")))
    }
}
