use std::path::PathBuf;

use frameio_transfer::{TransferError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{method} {url} failed with status {status}: {body}")]
    Api {
        method: String,
        url: String,
        status: u16,
        body: String,
    },
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
    #[error("not a file or directory: {}", .0.display())]
    InvalidPath(PathBuf),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// HTTP status of a rejected API call.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
