use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use frameio_core::ByteRange;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{ChunkFailure, TransferError};
use crate::progress::TransferProgress;

/// One chunk of work: a byte range moved to or from `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTask {
    pub url: String,
    pub range: ByteRange,
}

/// Outcome of every task handed to [`TransferWorkerPool::run`].
#[derive(Debug, Default)]
pub struct PoolReport {
    pub total: usize,
    /// Successful chunks with the bytes each moved, ordered by chunk index.
    pub completed: Vec<(ByteRange, u64)>,
    /// Failed chunks, ordered by chunk index.
    pub failures: Vec<ChunkFailure>,
}

impl PoolReport {
    pub fn bytes_transferred(&self) -> u64 {
        self.completed.iter().map(|(_, n)| n).sum()
    }

    /// Number of tasks with neither an outcome nor a failure on record.
    pub fn unaccounted(&self) -> usize {
        self.total
            .saturating_sub(self.completed.len() + self.failures.len())
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.unaccounted() == 0
    }

    /// Total bytes moved, or `ChunkTransferFailed` unless every chunk completed.
    pub fn into_result(self) -> Result<u64, TransferError> {
        if self.is_success() {
            return Ok(self.bytes_transferred());
        }
        let missing = self.unaccounted();
        let mut failures = self.failures;
        if missing > 0 {
            failures.push(ChunkFailure {
                range: ByteRange::default(),
                error: TransferError::TaskAborted(format!("{missing} chunk(s) reported no outcome")),
            });
        }
        Err(TransferError::ChunkTransferFailed {
            total: self.total,
            failures,
        })
    }
}

/// Runs independent chunk tasks with at most `concurrency` in flight.
///
/// Every task runs to completion or failure; one failure never cancels its
/// siblings. Only the cancellation token stops work early.
pub struct TransferWorkerPool {
    concurrency: usize,
    cancel: CancellationToken,
    progress: Arc<TransferProgress>,
}

impl TransferWorkerPool {
    pub fn new(concurrency: usize, cancel: CancellationToken, progress: Arc<TransferProgress>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel,
            progress,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run<F, Fut>(&self, tasks: Vec<ChunkTask>, op: F) -> PoolReport
    where
        F: Fn(ChunkTask) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<u64, TransferError>> + Send + 'static,
    {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let op = Arc::new(op);
        let mut join_set = JoinSet::new();
        let mut ranges = HashMap::with_capacity(total);

        for task in tasks {
            let sem = Arc::clone(&semaphore);
            let op = Arc::clone(&op);
            let cancel = self.cancel.clone();
            let range = task.range;

            let handle = join_set.spawn(async move {
                let _permit = tokio::select! {
                    permit = sem.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return (range, Err(TransferError::Cancelled)),
                    },
                    _ = cancel.cancelled() => return (range, Err(TransferError::Cancelled)),
                };
                if cancel.is_cancelled() {
                    return (range, Err(TransferError::Cancelled));
                }

                // Building and polling the body both happen in their own task so a
                // panic in either is reported against this chunk.
                let mut handle = tokio::spawn(async move { op(task).await });
                let outcome = tokio::select! {
                    joined = &mut handle => match joined {
                        Ok(result) => result,
                        Err(e) => Err(TransferError::TaskAborted(e.to_string())),
                    },
                    _ = cancel.cancelled() => {
                        handle.abort();
                        Err(TransferError::Cancelled)
                    }
                };
                (range, outcome)
            });
            ranges.insert(handle.id(), range);
        }

        let mut report = PoolReport {
            total,
            ..Default::default()
        };
        while let Some(joined) = join_set.join_next_with_id().await {
            let (range, outcome) = match joined {
                Ok((_, (range, outcome))) => (range, outcome),
                Err(join_err) => {
                    tracing::warn!("chunk worker panicked: {join_err}");
                    let range = ranges.get(&join_err.id()).copied().unwrap_or_default();
                    (range, Err(TransferError::TaskAborted(join_err.to_string())))
                }
            };
            match outcome {
                Ok(bytes) => {
                    self.progress.chunk_completed();
                    report.completed.push((range, bytes));
                }
                Err(error) => {
                    tracing::warn!("chunk {} failed: {}", range, error);
                    self.progress.chunk_failed();
                    report.failures.push(ChunkFailure { range, error });
                }
            }
        }

        report.completed.sort_by_key(|(range, _)| range.index);
        report.failures.sort_by_key(|f| f.range.index);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn tasks(n: usize) -> Vec<ChunkTask> {
        frameio_core::plan_parts(n as u64 * 10, n)
            .unwrap()
            .into_iter()
            .map(|range| ChunkTask {
                url: format!("https://cdn.test/{}", range.index),
                range,
            })
            .collect()
    }

    fn pool(concurrency: usize) -> TransferWorkerPool {
        TransferWorkerPool::new(
            concurrency,
            CancellationToken::new(),
            Arc::new(TransferProgress::new()),
        )
    }

    #[tokio::test]
    async fn runs_every_task() {
        let report = pool(3)
            .run(tasks(10), |task| async move { Ok(task.range.len) })
            .await;
        assert!(report.is_success());
        assert_eq!(report.completed.len(), 10);
        assert_eq!(report.bytes_transferred(), 100);
        let indices: Vec<usize> = report.completed.iter().map(|(r, _)| r.index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));

        let report = pool(2)
            .run(tasks(8), move |task| {
                let (f, p) = (Arc::clone(&f), Arc::clone(&p));
                async move {
                    let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                    p.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    f.fetch_sub(1, Ordering::SeqCst);
                    Ok(task.range.len)
                }
            })
            .await;

        assert!(report.is_success());
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_do_not_cancel_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&finished);

        let report = pool(4)
            .run(tasks(6), move |task| {
                let done = Arc::clone(&done);
                async move {
                    if task.range.index == 1 {
                        return Err(TransferError::RequestFailed {
                            status: 500,
                            url: task.url,
                        });
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                    Ok(task.range.len)
                }
            })
            .await;

        assert_eq!(finished.load(Ordering::SeqCst), 5);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].range.index, 1);

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, TransferError::ChunkTransferFailed { total: 6, .. }));
        assert_eq!(err.chunk_failures().len(), 1);
    }

    #[tokio::test]
    async fn panics_become_chunk_failures() {
        let report = pool(2)
            .run(tasks(3), |task| async move {
                if task.range.index == 2 {
                    panic!("boom");
                }
                Ok(task.range.len)
            })
            .await;
        assert_eq!(report.completed.len(), 2);
        assert!(matches!(report.failures[0].error, TransferError::TaskAborted(_)));
    }

    #[tokio::test]
    async fn panic_while_building_a_chunk_is_a_failure() {
        let report = pool(2)
            .run(tasks(3), |task| {
                if task.range.index == 2 {
                    panic!("no future for chunk 2");
                }
                async move { Ok(task.range.len) }
            })
            .await;

        assert_eq!(report.completed.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].range.index, 2);
        assert!(matches!(report.failures[0].error, TransferError::TaskAborted(_)));
        assert!(!report.is_success());

        let err = report.into_result().unwrap_err();
        assert!(matches!(err, TransferError::ChunkTransferFailed { total: 3, .. }));
    }

    #[test]
    fn missing_outcomes_are_not_success() {
        let ranges = frameio_core::plan_parts(30, 3).unwrap();
        let report = PoolReport {
            total: 3,
            completed: vec![(ranges[0], 10), (ranges[1], 10)],
            failures: Vec::new(),
        };
        assert_eq!(report.unaccounted(), 1);
        assert!(!report.is_success());

        let err = report.into_result().unwrap_err();
        assert_eq!(err.chunk_failures().len(), 1);
        assert!(matches!(err.chunk_failures()[0].error, TransferError::TaskAborted(_)));
    }

    #[tokio::test]
    async fn cancellation_stops_pending_tasks() {
        let cancel = CancellationToken::new();
        let pool = TransferWorkerPool::new(1, cancel.clone(), Arc::new(TransferProgress::new()));
        let trigger = cancel.clone();

        let report = pool
            .run(tasks(5), move |task| {
                let trigger = trigger.clone();
                async move {
                    // Whichever chunk starts first cancels the whole job.
                    trigger.cancel();
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(task.range.len)
                }
            })
            .await;

        assert!(report.completed.is_empty());
        assert_eq!(report.failures.len(), 5);
        assert!(report
            .failures
            .iter()
            .all(|f| matches!(f.error, TransferError::Cancelled)));
    }
}
