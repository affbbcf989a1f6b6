use std::fmt;
use std::path::PathBuf;

use frameio_core::ByteRange;
use thiserror::Error;

/// Failure of the HTTP collaborator itself (no response obtained).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("response body error: {0}")]
    Body(String),
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// One chunk that did not make it.
#[derive(Debug)]
pub struct ChunkFailure {
    pub range: ByteRange,
    pub error: TransferError,
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk {}: {}", self.range, self.error)
    }
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("no download URL is available for asset {asset_id}")]
    DownloadUnavailable { asset_id: String },
    #[error("asset {asset_id} has not finished uploading")]
    AssetNotReady { asset_id: String },
    #[error("unsupported asset type: {0}")]
    UnsupportedAssetType(String),
    #[error("the service has not produced a checksum for asset {asset_id}")]
    ChecksumMissing { asset_id: String },
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", .path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("{} of {total} chunk transfers failed{}", .failures.len(), first_failure(.failures))]
    ChunkTransferFailed {
        total: usize,
        failures: Vec<ChunkFailure>,
    },
    #[error("local file already exists: {}", .0.display())]
    LocalFileConflict(PathBuf),
    #[error("asset {asset_id} has no upload URLs")]
    MissingUploadUrls { asset_id: String },
    #[error("local file is {actual} bytes but the asset declares {expected}")]
    LocalSizeMismatch { expected: u64, actual: u64 },
    #[error("request to {url} failed with status {status}")]
    RequestFailed { status: u16, url: String },
    #[error("expected {expected} bytes, received {actual}")]
    UnexpectedLength { expected: u64, actual: u64 },
    #[error("transfer cancelled")]
    Cancelled,
    #[error("transfer task aborted: {0}")]
    TaskAborted(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("core error: {0}")]
    Core(#[from] frameio_core::CoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn first_failure(failures: &[ChunkFailure]) -> String {
    failures
        .first()
        .map(|f| format!("; first: {f}"))
        .unwrap_or_default()
}

impl TransferError {
    /// Failures of a chunked transfer, empty for every other variant.
    pub fn chunk_failures(&self) -> &[ChunkFailure] {
        match self {
            TransferError::ChunkTransferFailed { failures, .. } => failures,
            _ => &[],
        }
    }
}
