//! Failure taxonomy for an upload attempt.

use thiserror::Error;

use crate::types::UploadResult;

/// Ways an upload attempt can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The picked image could not be copied to the staging area
    #[error("Image read error: {0}")]
    Staging(String),

    /// The server answered with a non-success status
    #[error("{0}")]
    Server(String),

    /// The request did not complete (timeout, DNS, reset, bad URL)
    #[error("{0}")]
    Transport(String),
}

impl UploadError {
    pub fn staging(cause: impl std::fmt::Display) -> Self {
        UploadError::Staging(cause.to_string())
    }
}

impl From<UploadError> for UploadResult {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Server(reason) => UploadResult::ServerError(reason),
            staging @ UploadError::Staging(_) => UploadResult::TransportError(staging.to_string()),
            UploadError::Transport(message) => UploadResult::TransportError(message),
        }
    }
}
