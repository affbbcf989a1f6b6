use std::path::Path;
use std::sync::Arc;

use frameio_core::{Asset, TransferOptions};
use tokio_util::sync::CancellationToken;

use crate::download::{self, TransferResult};
use crate::error::TransferError;
use crate::http::{ReqwestSessionFactory, SessionFactory};
use crate::pool::TransferWorkerPool;
use crate::progress::TransferProgress;
use crate::retry::RetryPolicy;
use crate::session::SessionPool;
use crate::upload;

/// Entry point for moving asset bytes to and from pre-signed URLs.
///
/// Requests made here never carry API credentials; the URLs authorize
/// themselves.
#[derive(Clone)]
pub struct TransferClient {
    factory: Arc<dyn SessionFactory>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    progress: Option<Arc<TransferProgress>>,
}

impl Default for TransferClient {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestSessionFactory::new()))
    }
}

impl TransferClient {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cancelling `token` stops every transfer started by this client.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Report byte and chunk counts into `progress` instead of a private counter.
    pub fn with_progress(mut self, progress: Arc<TransferProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Download `asset` into `destination_dir`.
    pub async fn download(
        &self,
        asset: &Asset,
        destination_dir: &Path,
        options: &TransferOptions,
    ) -> Result<TransferResult, TransferError> {
        download::run(&self.job(), asset, destination_dir, options).await
    }

    /// Upload `local_file` to the pre-signed part URLs of `asset`.
    pub async fn upload(
        &self,
        asset: &Asset,
        local_file: &Path,
        options: &TransferOptions,
    ) -> Result<Asset, TransferError> {
        upload::run(&self.job(), asset, local_file, options).await
    }

    fn job(&self) -> Job {
        Job {
            sessions: Arc::new(SessionPool::new(Arc::clone(&self.factory), self.policy.clone())),
            progress: self
                .progress
                .clone()
                .unwrap_or_else(|| Arc::new(TransferProgress::new())),
            cancel: self.cancel.clone(),
        }
    }
}

/// State owned by a single download or upload.
pub(crate) struct Job {
    pub sessions: Arc<SessionPool>,
    pub progress: Arc<TransferProgress>,
    pub cancel: CancellationToken,
}

impl Job {
    pub fn workers(&self, concurrency: usize) -> TransferWorkerPool {
        TransferWorkerPool::new(concurrency, self.cancel.clone(), Arc::clone(&self.progress))
    }
}
