//! Concurrent chunked transfer of asset bytes over pre-signed URLs.
//!
//! Downloads above the multipart threshold are split into byte ranges and
//! fetched by a bounded pool of workers, each writing its range through its
//! own file handle. Uploads PUT one slice of the local file to each part URL.

pub mod client;
pub mod download;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod session;
mod upload;

pub use client::TransferClient;
pub use download::{Cdn, ChecksumOutcome, Strategy, TransferResult};
pub use error::{ChunkFailure, TransferError, TransportError};
pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestSessionFactory, ReqwestTransport, SessionFactory};
#[cfg(any(test, feature = "test-util"))]
pub use memory::{CannedResponse, Fault, MemoryTransport};
pub use pool::{ChunkTask, PoolReport, TransferWorkerPool};
pub use progress::{ProgressSnapshot, TransferProgress};
pub use retry::{RetryPolicy, RetryingTransport};
pub use session::{SessionLease, SessionPool};
