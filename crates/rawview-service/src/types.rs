//! Key and status types shared across the service.
//!
//! These are the values UI code passes in and gets back: the path key that
//! identifies a source file, the outcome of a preload hint, and the
//! diagnostic counters.

use std::borrow::Borrow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifies a source RAW file.
///
/// Used verbatim as the cache key and the deduplication key; the service
/// never normalises or resolves it. Clones are cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePath(Arc<str>);

impl ImagePath {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ImagePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for ImagePath {
    fn as_ref(&self) -> &Path {
        Path::new(&*self.0)
    }
}

impl From<&str> for ImagePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for ImagePath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for ImagePath {
    fn from(path: &Path) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }
}

impl From<&ImagePath> for ImagePath {
    fn from(path: &ImagePath) -> Self {
        path.clone()
    }
}

/// What a [`preload`](crate::RawImageService::preload) hint did.
///
/// Preloading is best-effort: whatever happens to the decode afterwards,
/// including failure, is not reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreloadOutcome {
    /// The full image was already cached; nothing was started.
    AlreadyCached,
    /// A decode for this path was already in flight.
    AlreadyPending,
    /// A new background decode was started.
    Dispatched,
}

/// Snapshot of service counters, for diagnostics only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries in the full-image cache.
    pub cache_size: usize,
    /// Entries in the thumbnail cache.
    pub thumbnail_cache_size: usize,
    /// Full decodes currently in flight.
    pub pending_decodes: usize,
    pub total_workers: usize,
    pub available_workers: usize,
    /// Requests waiting for a free worker.
    pub queued_requests: usize,
    /// Full decodes dispatched to the pool since startup.
    pub decodes_dispatched: u64,
    /// Thumbnails derived from full images since startup.
    pub thumbnails_derived: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_image_path_conversions() {
        let a = ImagePath::from("/photos/a.arw");
        let b = ImagePath::from(String::from("/photos/a.arw"));
        let c = ImagePath::from(Path::new("/photos/a.arw"));
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.to_string(), "/photos/a.arw");
    }

    #[test]
    fn test_image_path_borrow_lookup() {
        let mut map = HashMap::new();
        map.insert(ImagePath::from("x.nef"), 1);
        assert_eq!(map.get("x.nef"), Some(&1));
    }

    #[test]
    fn test_image_path_is_not_normalised() {
        assert_ne!(ImagePath::from("a/b.dng"), ImagePath::from("a//b.dng"));
    }

    #[test]
    fn test_image_path_serde_is_transparent() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Entry {
            path: ImagePath,
        }

        let entry: Entry = toml::from_str(r#"path = "/photos/a.arw""#).unwrap();
        assert_eq!(entry.path, ImagePath::from("/photos/a.arw"));

        let text = toml::to_string(&entry).unwrap();
        assert_eq!(text.trim(), r#"path = "/photos/a.arw""#);
    }
}
