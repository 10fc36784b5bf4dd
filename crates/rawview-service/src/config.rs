//! Service configuration.
//!
//! All bounds are read once when the service is built; there is no way to
//! resize caches or the pool afterwards.

use serde::{Deserialize, Serialize};
use tracing::error;

use rawview_core::EncodeQualities;

use crate::error::ConfigError;

/// Sizing and quality knobs for a [`RawImageService`](crate::RawImageService).
///
/// Every field has a default, so a TOML document only needs the keys it
/// wants to change:
///
/// ```toml
/// max_cache_size = 30
/// thumbnail_width = 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Full-size images kept in memory.
    pub max_cache_size: usize,
    /// Thumbnails kept in memory; they are small, so this can be generous.
    pub max_thumbnail_cache_size: usize,
    /// Upper bound on decode worker threads.
    pub max_workers: usize,
    /// Thumbnail width in pixels; height follows the aspect ratio.
    pub thumbnail_width: u32,
    /// JPEG quality for full images (1-100).
    pub full_quality: u8,
    /// JPEG quality for thumbnails (1-100).
    pub thumbnail_quality: u8,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 50,
            max_thumbnail_cache_size: 200,
            max_workers: 4,
            thumbnail_width: 320,
            full_quality: 92,
            thumbnail_quality: 70,
        }
    }
}

impl ServiceConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_size == 0 {
            return Err(ConfigError::ZeroCapacity("max_cache_size"));
        }
        if self.max_thumbnail_cache_size == 0 {
            return Err(ConfigError::ZeroCapacity("max_thumbnail_cache_size"));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.thumbnail_width == 0 {
            return Err(ConfigError::ZeroThumbnailWidth);
        }
        for (field, value) in [
            ("full_quality", self.full_quality),
            ("thumbnail_quality", self.thumbnail_quality),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::QualityOutOfRange { field, value });
            }
        }
        Ok(())
    }

    pub fn qualities(&self) -> EncodeQualities {
        EncodeQualities {
            full: self.full_quality,
            thumbnail: self.thumbnail_quality,
        }
    }

    /// Number of decode workers to start: hardware parallelism capped at
    /// `max_workers`, never less than one.
    pub fn worker_count(&self) -> usize {
        let parallelism = std::thread::available_parallelism().map_or_else(
            |e| {
                error!("Failed to get available parallelism for decode workers: {e:#?}");
                1
            },
            |non_zero| non_zero.get(),
        );
        parallelism.min(self.max_workers).max(1)
    }
}
