//! The decode orchestrator.
//!
//! [`RawImageService`] is the single entry point UI code talks to. It owns
//! both caches, the map of in-flight work, and the worker pool, and it
//! guarantees that a given path is decoded at most once at a time no matter
//! how many callers ask for it, or in which rendition.
//!
//! Thumbnails are never decoded on their own. A thumbnail request reuses the
//! cached full image when there is one, joins the in-flight full decode when
//! there is one, and otherwise starts a full decode and shrinks its result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use rawview_core::{
    derive_thumbnail, DecodeError, EncodedImage, ImageKind, RawDecoder, RawloaderDecoder,
};
use tokio::runtime::Handle;
use tracing::{debug, instrument, trace, warn};

use crate::cache::LruImageCache;
use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::pool::WorkerPool;
use crate::source::{FileSource, FsFileSource};
use crate::types::{CacheStats, ImagePath, PreloadOutcome};
use crate::worker::{DecodeResult, DecodeWorker};

/// Completion handle of in-flight work, awaitable by any number of callers.
type SharedDecode = Shared<BoxFuture<'static, DecodeResult>>;

/// An image that is either at hand or still being produced.
enum Lookup {
    Cached(EncodedImage),
    InFlight(SharedDecode),
}

impl Lookup {
    async fn resolve(self) -> DecodeResult {
        match self {
            Self::Cached(image) => Ok(image),
            Self::InFlight(decode) => decode.await,
        }
    }
}

struct ServiceState {
    images: LruImageCache<ImagePath, EncodedImage>,
    thumbnails: LruImageCache<ImagePath, EncodedImage>,
    /// Full decodes in flight. At most one per path.
    decoding: HashMap<ImagePath, SharedDecode>,
    /// Thumbnail derivations in flight. At most one per path.
    deriving: HashMap<ImagePath, SharedDecode>,
}

impl ServiceState {
    fn in_flight(&mut self, kind: ImageKind) -> &mut HashMap<ImagePath, SharedDecode> {
        match kind {
            ImageKind::Full => &mut self.decoding,
            ImageKind::Thumbnail => &mut self.deriving,
        }
    }
}

struct Inner {
    config: ServiceConfig,
    state: Mutex<ServiceState>,
    pool: WorkerPool,
    source: Arc<dyn FileSource>,
    runtime: Handle,
    decodes_dispatched: AtomicU64,
    thumbnails_derived: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Unregisters an in-flight entry if its task is dropped before settling,
/// either cancelled by runtime shutdown or unwound by a panic.
struct InFlightGuard {
    inner: Arc<Inner>,
    kind: ImageKind,
    path: ImagePath,
    armed: bool,
}

impl InFlightGuard {
    /// The task settled and removed its own entry.
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let removed = self.inner.lock().in_flight(self.kind).remove(&self.path);
        if removed.is_some() {
            warn!(path = %self.path, kind = ?self.kind, "In-flight task abandoned");
        }
    }
}

/// Cached, deduplicated RAW decoding.
///
/// Cheap to clone; clones share the same caches and workers. Must be built
/// inside a Tokio runtime, which is used for file reads and thumbnail
/// derivation. Decoding itself runs on the service's own worker threads.
#[derive(Clone)]
pub struct RawImageService {
    inner: Arc<Inner>,
}

impl RawImageService {
    /// Service backed by the filesystem and the built-in RAW decoder.
    pub fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        Self::with_parts(config, Arc::new(RawloaderDecoder), Arc::new(FsFileSource))
    }

    pub fn with_defaults() -> Result<Self, ServiceError> {
        Self::new(ServiceConfig::default())
    }

    /// Service with a custom decoder backend and file source.
    pub fn with_parts(
        config: ServiceConfig,
        decoder: Arc<dyn RawDecoder>,
        source: Arc<dyn FileSource>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ServiceError::NoRuntime)?;

        let worker = DecodeWorker::new(decoder, config.qualities(), config.thumbnail_width);
        let pool = WorkerPool::start(config.worker_count(), worker)?;

        debug!(
            max_cache_size = config.max_cache_size,
            max_thumbnail_cache_size = config.max_thumbnail_cache_size,
            workers = pool.worker_count(),
            "RAW image service started"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ServiceState {
                    images: LruImageCache::new(config.max_cache_size),
                    thumbnails: LruImageCache::new(config.max_thumbnail_cache_size),
                    decoding: HashMap::new(),
                    deriving: HashMap::new(),
                }),
                config,
                pool,
                source,
                runtime,
                decodes_dispatched: AtomicU64::new(0),
                thumbnails_derived: AtomicU64::new(0),
            }),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    /// Get the full image or thumbnail for `path`, decoding if needed.
    ///
    /// Cache hits count as uses for LRU purposes. Concurrent calls for the
    /// same path share one decode and all see its result, success or
    /// failure. A failure is not cached; the next call starts over.
    pub async fn decode(&self, path: impl Into<ImagePath>, kind: ImageKind) -> DecodeResult {
        let path = path.into();

        let lookup = {
            let mut state = self.inner.lock();
            match kind {
                ImageKind::Full => self.full_source(&mut state, &path),
                ImageKind::Thumbnail => self.thumbnail_source(&mut state, &path),
            }
        };
        lookup.resolve().await
    }

    /// Cached full image, if any. Never starts a decode.
    pub fn image_from_cache(&self, path: &str) -> Option<EncodedImage> {
        self.inner.lock().images.get(path)
    }

    /// Cached thumbnail, if any. Never starts a decode.
    pub fn thumbnail_from_cache(&self, path: &str) -> Option<EncodedImage> {
        self.inner.lock().thumbnails.get(path)
    }

    pub fn get_from_cache(&self, path: &str, kind: ImageKind) -> Option<EncodedImage> {
        match kind {
            ImageKind::Full => self.image_from_cache(path),
            ImageKind::Thumbnail => self.thumbnail_from_cache(path),
        }
    }

    /// Whether a decode or thumbnail derivation for `path` is in flight.
    pub fn is_decoding(&self, path: &str) -> bool {
        let state = self.inner.lock();
        state.decoding.contains_key(path) || state.deriving.contains_key(path)
    }

    /// Start decoding `path` in the background if it is neither cached nor
    /// already being decoded.
    ///
    /// Fire-and-forget: returns at once, and the eventual result only lands
    /// in the cache. Failures are logged and otherwise dropped. Checking the
    /// cache here does not count as a use.
    pub fn preload(&self, path: impl Into<ImagePath>) -> PreloadOutcome {
        let path = path.into();
        let mut state = self.inner.lock();

        if state.images.contains(&path) {
            PreloadOutcome::AlreadyCached
        } else if state.decoding.contains_key(&path) {
            PreloadOutcome::AlreadyPending
        } else {
            trace!(%path, "Preloading");
            drop(self.start_decode(&mut state, path));
            PreloadOutcome::Dispatched
        }
    }

    /// Drop every cached full image and thumbnail.
    ///
    /// Work already in flight is not cancelled and will populate the caches
    /// when it finishes.
    pub fn clear_cache(&self) {
        let mut state = self.inner.lock();
        state.images.clear();
        state.thumbnails.clear();
        debug!("Cleared image caches");
    }

    pub fn clear_full_cache(&self) {
        self.inner.lock().images.clear();
    }

    pub fn clear_thumbnail_cache(&self) {
        self.inner.lock().thumbnails.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        let (cache_size, thumbnail_cache_size, pending_decodes) = {
            let state = self.inner.lock();
            (state.images.len(), state.thumbnails.len(), state.decoding.len())
        };
        let pool = &self.inner.pool;

        CacheStats {
            cache_size,
            thumbnail_cache_size,
            pending_decodes,
            total_workers: pool.worker_count(),
            available_workers: pool.available_workers(),
            queued_requests: pool.queued_requests(),
            decodes_dispatched: self.inner.decodes_dispatched.load(Ordering::Relaxed),
            thumbnails_derived: self.inner.thumbnails_derived.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker pool.
    ///
    /// Requests still waiting for a worker fail with
    /// [`DecodeError::ServiceStopped`]; decodes already running finish first.
    /// Later decodes fail the same way, while cached images stay readable.
    pub async fn shutdown(&self) {
        let service = self.clone();
        let stopped = self
            .inner
            .runtime
            .spawn_blocking(move || service.inner.pool.shutdown())
            .await;
        if let Err(e) = stopped {
            warn!(%e, "Worker pool shutdown did not complete cleanly");
        }
    }

    fn full_source(&self, state: &mut ServiceState, path: &ImagePath) -> Lookup {
        if let Some(image) = state.images.get(path) {
            trace!(%path, "Full image cache hit");
            return Lookup::Cached(image);
        }
        if let Some(decode) = state.decoding.get(path) {
            trace!(%path, "Joining in-flight decode");
            return Lookup::InFlight(decode.clone());
        }
        Lookup::InFlight(self.start_decode(state, path.clone()))
    }

    fn thumbnail_source(&self, state: &mut ServiceState, path: &ImagePath) -> Lookup {
        if let Some(thumbnail) = state.thumbnails.get(path) {
            trace!(%path, "Thumbnail cache hit");
            return Lookup::Cached(thumbnail);
        }
        if let Some(derivation) = state.deriving.get(path) {
            return Lookup::InFlight(derivation.clone());
        }

        let full = self.full_source(state, path);
        let service = self.clone();
        let task_path = path.clone();
        let derivation = self.spawn_shared(ImageKind::Thumbnail, path, async move {
            service.run_derivation(task_path, full).await
        });
        state.deriving.insert(path.clone(), derivation.clone());
        Lookup::InFlight(derivation)
    }

    /// Register and spawn a full decode. The caller holds the state lock, so
    /// the task cannot settle before it is registered.
    fn start_decode(&self, state: &mut ServiceState, path: ImagePath) -> SharedDecode {
        let service = self.clone();
        let task_path = path.clone();
        let decode = self.spawn_shared(ImageKind::Full, &path, async move {
            service.run_decode(task_path).await
        });
        state.decoding.insert(path, decode.clone());
        decode
    }

    /// Spawn `work` as the in-flight entry for `path`. The entry is removed
    /// by `work` itself on completion, or by a guard if the task never gets
    /// that far.
    fn spawn_shared<F>(&self, kind: ImageKind, path: &ImagePath, work: F) -> SharedDecode
    where
        F: std::future::Future<Output = DecodeResult> + Send + 'static,
    {
        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            kind,
            path: path.clone(),
            armed: true,
        };
        let task = self.inner.runtime.spawn(async move {
            let result = work.await;
            guard.disarm();
            result
        });
        async move {
            task.await.unwrap_or_else(|e| {
                Err(DecodeError::WorkerFault(format!("decode task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }

    #[instrument(skip_all, fields(%path))]
    async fn run_decode(&self, path: ImagePath) -> DecodeResult {
        let result = self.read_and_dispatch(&path).await;

        {
            let mut state = self.inner.lock();
            if let Ok(image) = &result {
                state.images.put(path.clone(), image.clone());
            }
            state.decoding.remove(&path);
        }

        match &result {
            Ok(image) => debug!(
                %path,
                width = image.width(),
                height = image.height(),
                bytes = image.byte_len(),
                "Decoded RAW file"
            ),
            Err(e) => debug!(%path, %e, "Failed to decode RAW file"),
        }
        result
    }

    async fn read_and_dispatch(&self, path: &ImagePath) -> DecodeResult {
        let bytes = self
            .inner
            .source
            .read(path)
            .await
            .map_err(|e| DecodeError::FileRead(format!("{path}: {e}")))?;

        self.inner.decodes_dispatched.fetch_add(1, Ordering::Relaxed);
        self.inner.pool.dispatch(bytes, ImageKind::Full).await
    }

    #[instrument(skip_all, fields(%path))]
    async fn run_derivation(&self, path: ImagePath, full: Lookup) -> DecodeResult {
        let result = self.derive(full).await;

        {
            let mut state = self.inner.lock();
            if let Ok(thumbnail) = &result {
                state.thumbnails.put(path.clone(), thumbnail.clone());
            }
            state.deriving.remove(&path);
        }

        if let Err(e) = &result {
            debug!(%path, %e, "Failed to produce thumbnail");
        }
        result
    }

    async fn derive(&self, full: Lookup) -> DecodeResult {
        let full = full.resolve().await?;
        let width = self.inner.config.thumbnail_width;
        let quality = self.inner.config.thumbnail_quality;

        let thumbnail = self
            .inner
            .runtime
            .spawn_blocking(move || derive_thumbnail(&full, width, quality))
            .await
            .map_err(|e| DecodeError::WorkerFault(format!("thumbnail task failed: {e}")))??;

        self.inner.thumbnails_derived.fetch_add(1, Ordering::Relaxed);
        Ok(thumbnail)
    }
}
