//! rawview Service - cached, deduplicated RAW decoding
//!
//! This crate wraps the `rawview-core` pipeline in a long-lived service that
//! hides decode latency from an interactive photo viewer.
//!
//! # Module Structure
//!
//! - `service` - [`RawImageService`], the entry point: cache lookup, request
//!   deduplication and thumbnail derivation
//! - `pool` - Fixed-size decode thread pool with a FIFO queue
//! - `worker` - The per-request decode job run on pool threads
//! - `cache` - Bounded LRU cache used for full images and thumbnails
//! - `source` - Where file bytes come from
//! - `config` - Cache sizes, worker count and encode qualities
//!
//! # Usage
//!
//! ```ignore
//! let service = RawImageService::with_defaults()?;
//!
//! // Grid view: cheap thumbnails, decoded once per file
//! let thumb = service.decode("/photos/DSC0001.ARW", ImageKind::Thumbnail).await?;
//!
//! // Warm the next image while the user looks at this one
//! service.preload("/photos/DSC0002.ARW");
//!
//! // Loupe view: served from cache if the thumbnail request already decoded it
//! let full = service.decode("/photos/DSC0001.ARW", ImageKind::Full).await?;
//! ```

mod cache;
mod config;
mod error;
mod pool;
mod service;
mod source;
mod types;
mod worker;

pub use cache::LruImageCache;
pub use config::ServiceConfig;
pub use error::{ConfigError, ServiceError};
pub use service::RawImageService;
pub use source::{FileSource, FsFileSource, MemoryFileSource};
pub use types::{CacheStats, ImagePath, PreloadOutcome};
pub use worker::DecodeResult;

pub use rawview_core::{
    is_raw_extension, is_raw_path, DecodeError, EncodedImage, ImageKind, RawDecoder,
    RAW_EXTENSIONS,
};
