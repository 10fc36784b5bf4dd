//! Where RAW file bytes come from.

use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::types::ImagePath;

/// Reads the full contents of a source file.
///
/// The service reads the whole file before handing it to a worker; a failed
/// read becomes [`DecodeError::FileRead`](rawview_core::DecodeError::FileRead).
#[async_trait]
pub trait FileSource: Send + Sync + 'static {
    async fn read(&self, path: &ImagePath) -> io::Result<Vec<u8>>;
}

/// Reads from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileSource;

#[async_trait]
impl FileSource for FsFileSource {
    async fn read(&self, path: &ImagePath) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

/// In-memory files keyed by path. Handy for embedding and for tests.
#[derive(Debug, Default)]
pub struct MemoryFileSource {
    files: Mutex<HashMap<ImagePath, Vec<u8>>>,
}

impl MemoryFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<ImagePath>, bytes: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), bytes.into());
    }

    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
    }
}

#[async_trait]
impl FileSource for MemoryFileSource {
    async fn read(&self, path: &ImagePath) -> io::Result<Vec<u8>> {
        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        files.get(path.as_str()).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{path}: no such file"))
        })
    }
}
