//! Collaborator interfaces for the host UI.
//!
//! The picker and the crop dropdown live in the host. The workflow only sees
//! these narrow traits, so it can run against a file on disk, an in-memory
//! buffer, or a test double.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::types::CropType;

pub type ImageReader = Box<dyn AsyncRead + Send + Unpin>;

/// Something the user picked that can be read as image bytes
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Human-readable description for logs
    fn describe(&self) -> String;

    /// Open a fresh reader over the image bytes
    async fn open(&self) -> io::Result<ImageReader>;
}

/// Source of the currently selected crop
pub trait CategorySource: Send + Sync {
    fn selected(&self) -> CropType;
}

impl CategorySource for CropType {
    fn selected(&self) -> CropType {
        *self
    }
}

/// Image picked from the local filesystem
#[derive(Debug, Clone)]
pub struct FileImageSource {
    path: PathBuf,
}

impl FileImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn open(&self) -> io::Result<ImageReader> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

/// Image already held in memory (clipboard paste, camera buffer)
#[derive(Debug, Clone)]
pub struct MemoryImageSource {
    label: String,
    bytes: Vec<u8>,
}

impl MemoryImageSource {
    pub fn new(label: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            bytes,
        }
    }
}

#[async_trait]
impl ImageSource for MemoryImageSource {
    fn describe(&self) -> String {
        format!("{} ({} bytes in memory)", self.label, self.bytes.len())
    }

    async fn open(&self) -> io::Result<ImageReader> {
        Ok(Box::new(io::Cursor::new(self.bytes.clone())))
    }
}
