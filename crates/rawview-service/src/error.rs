//! Service construction errors.
//!
//! Per-request failures are [`DecodeError`](rawview_core::DecodeError)s; the
//! types here only come out of building a service.

use thiserror::Error;

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0} must be at least 1")]
    ZeroCapacity(&'static str),

    #[error("max_workers must be at least 1")]
    ZeroWorkers,

    #[error("thumbnail_width must be at least 1")]
    ZeroThumbnailWidth,

    #[error("{field} must be between 1 and 100, got {value}")]
    QualityOutOfRange { field: &'static str, value: u8 },
}

/// Errors from starting a [`RawImageService`](crate::RawImageService).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn decode worker: {0}")]
    SpawnWorker(#[from] std::io::Error),

    #[error("RawImageService must be created inside a Tokio runtime")]
    NoRuntime,
}
