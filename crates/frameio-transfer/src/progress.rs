use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Aggregate counters shared by every worker of one transfer.
///
/// Workers only ever add; readers may poll from any thread.
#[derive(Debug)]
pub struct TransferProgress {
    total_bytes: AtomicU64,
    bytes_transferred: AtomicU64,
    chunks_total: AtomicUsize,
    chunks_completed: AtomicUsize,
    chunks_failed: AtomicUsize,
    started_at: Instant,
}

/// Point-in-time copy of [`TransferProgress`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub total_bytes: u64,
    pub bytes_transferred: u64,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub chunks_failed: usize,
    pub bytes_per_second: f64,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0).min(100.0)
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress {
    pub fn new() -> Self {
        Self {
            total_bytes: AtomicU64::new(0),
            bytes_transferred: AtomicU64::new(0),
            chunks_total: AtomicUsize::new(0),
            chunks_completed: AtomicUsize::new(0),
            chunks_failed: AtomicUsize::new(0),
            started_at: Instant::now(),
        }
    }

    pub(crate) fn begin(&self, total_bytes: u64, chunks: usize) {
        self.total_bytes.store(total_bytes, Ordering::SeqCst);
        self.chunks_total.store(chunks, Ordering::SeqCst);
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes_transferred.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn chunk_completed(&self) {
        self.chunks_completed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn chunk_failed(&self) {
        self.chunks_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let bytes = self.bytes_transferred();
        let elapsed = self.started_at.elapsed().as_secs_f64();
        ProgressSnapshot {
            total_bytes: self.total_bytes.load(Ordering::SeqCst),
            bytes_transferred: bytes,
            chunks_total: self.chunks_total.load(Ordering::SeqCst),
            chunks_completed: self.chunks_completed.load(Ordering::SeqCst),
            chunks_failed: self.chunks_failed.load(Ordering::SeqCst),
            bytes_per_second: if elapsed > 0.0 { bytes as f64 / elapsed } else { 0.0 },
        }
    }
}
