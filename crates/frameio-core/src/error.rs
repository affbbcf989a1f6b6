use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("part count must be at least 1")]
    ZeroParts,
    #[error("chunk size must be at least 1 byte")]
    ZeroChunkSize,
    #[error("invalid asset: {0}")]
    InvalidAsset(String),
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
