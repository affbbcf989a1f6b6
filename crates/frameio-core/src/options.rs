use crate::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};

/// Per-call transfer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Maximum number of chunks in flight.
    pub concurrency: usize,
    /// Replace an existing local file instead of returning it.
    pub overwrite: bool,
    /// Re-hash the downloaded file against the service's checksum. An asset
    /// without one is rejected before any bytes move.
    pub verify_checksum: bool,
    /// Prepended to the normalized asset name.
    pub filename_prefix: Option<String>,
    /// Allow ranged, concurrent downloads for files above the threshold.
    pub multi_part: bool,
    /// Byte length of one download chunk.
    pub chunk_size: u64,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            overwrite: false,
            verify_checksum: true,
            filename_prefix: None,
            multi_part: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TransferOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn with_filename_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filename_prefix = Some(prefix.into());
        self
    }

    pub fn with_multi_part(mut self, multi_part: bool) -> Self {
        self.multi_part = multi_part;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Concurrency clamped to at least one worker.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = TransferOptions::default();
        assert_eq!(opts.concurrency, 5);
        assert!(!opts.overwrite);
        assert!(opts.verify_checksum);
        assert!(!opts.multi_part);
        assert_eq!(opts.chunk_size, 25 * 1024 * 1024);
    }

    #[test]
    fn builders_clamp_zero() {
        let opts = TransferOptions::default()
            .with_concurrency(0)
            .with_chunk_size(0);
        assert_eq!(opts.concurrency, 1);
        assert_eq!(opts.chunk_size, 1);

        let raw = TransferOptions {
            concurrency: 0,
            ..Default::default()
        };
        assert_eq!(raw.effective_concurrency(), 1);
    }
}
