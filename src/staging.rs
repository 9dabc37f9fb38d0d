//! Local staging of the picked image before it is sent.
//!
//! Every attempt gets its own directory under the staging root so attempts
//! running side by side never touch each other's file. The staged file is
//! always called `input.jpg`, matching the file name the server expects.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::errors::UploadError;
use crate::sources::ImageSource;

pub const STAGED_FILE_NAME: &str = "input.jpg";

const STAGING_DIR_NAME: &str = "crop-diagnosis-uploader";

/// Default staging root: `<temp>/crop-diagnosis-uploader/staging`
pub fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join(STAGING_DIR_NAME).join("staging")
}

/// Where staged copies are written
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy the image's bytes into a fresh per-attempt directory
    pub async fn stage(
        &self,
        attempt_id: Uuid,
        source: &dyn ImageSource,
    ) -> Result<StagedImage, UploadError> {
        let dir = self.root.join(attempt_id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(UploadError::staging)?;

        let staged = StagedImage {
            path: dir.join(STAGED_FILE_NAME),
            dir,
            size: 0,
        };

        // The directory exists from here on; hand it to cleanup on every failure.
        match copy_into(source, &staged.path).await {
            Ok(size) => {
                tracing::debug!(
                    attempt_id = %attempt_id,
                    bytes = size,
                    path = %staged.path.display(),
                    "Staged image"
                );
                Ok(StagedImage { size, ..staged })
            }
            Err(e) => {
                staged.discard().await;
                Err(UploadError::staging(e))
            }
        }
    }
}

impl Default for StagingArea {
    fn default() -> Self {
        Self::new(default_staging_root())
    }
}

async fn copy_into(source: &dyn ImageSource, dest: &Path) -> std::io::Result<u64> {
    let mut reader = source.open().await?;
    let mut file = tokio::fs::File::create(dest).await?;
    let size = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(size)
}

/// Copy of the picked image owned by a single attempt
#[derive(Debug)]
pub struct StagedImage {
    dir: PathBuf,
    path: PathBuf,
    size: u64,
}

impl StagedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Open the staged copy for streaming into the request body
    pub async fn open(&self) -> Result<tokio::fs::File, UploadError> {
        tokio::fs::File::open(&self.path)
            .await
            .map_err(UploadError::staging)
    }

    /// Remove the attempt directory. Failures are logged and otherwise ignored.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.dir.display(),
                    error = %e,
                    "Failed to remove staged image"
                );
            }
        }
    }
}
