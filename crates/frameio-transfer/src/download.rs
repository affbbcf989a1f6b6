use std::fmt;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use frameio_core::filename::local_filename;
use frameio_core::units::{format_size, format_speed};
use frameio_core::{plan_by_size, Asset, TransferOptions, MULTIPART_THRESHOLD};
use reqwest::StatusCode;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::client::Job;
use crate::error::TransferError;
use crate::http::{HttpRequest, HttpResponse};
use crate::pool::ChunkTask;
use crate::progress::TransferProgress;
use crate::session::SessionPool;

/// How the bytes of a download were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The destination already existed and was returned untouched.
    Cached,
    WholeFile,
    Chunked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumOutcome {
    Verified,
    /// Verification was disabled or does not apply (watermarked, cached).
    Skipped,
}

/// Edge network serving a download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cdn {
    CloudFront,
    S3,
    Unknown,
}

impl Cdn {
    pub fn classify(url: &str) -> Self {
        if url.contains("assets.frame.io") {
            Cdn::CloudFront
        } else if url.contains("s3") {
            Cdn::S3
        } else {
            Cdn::Unknown
        }
    }
}

impl fmt::Display for Cdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cdn::CloudFront => write!(f, "CloudFront"),
            Cdn::S3 => write!(f, "S3"),
            Cdn::Unknown => write!(f, "unknown"),
        }
    }
}

/// Summary of a finished download.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult {
    pub path: PathBuf,
    pub elapsed: Duration,
    pub bytes: u64,
    /// Bytes per second over `elapsed`.
    pub throughput: f64,
    pub concurrency: usize,
    pub chunks: usize,
    pub strategy: Strategy,
    pub checksum: ChecksumOutcome,
    pub cdn: Cdn,
}

pub(crate) async fn run(
    job: &Job,
    asset: &Asset,
    destination_dir: &Path,
    options: &TransferOptions,
) -> Result<TransferResult, TransferError> {
    let started = Instant::now();

    if !asset.is_file() {
        return Err(TransferError::UnsupportedAssetType(
            asset.asset_type.clone().unwrap_or_default(),
        ));
    }
    if !asset.is_ready() {
        return Err(TransferError::AssetNotReady {
            asset_id: asset.id.clone(),
        });
    }
    fs::create_dir_all(destination_dir).await?;
    let path = destination_dir.join(local_filename(
        &asset.name,
        options.filename_prefix.as_deref(),
    ));

    let exists = fs::try_exists(&path).await?;
    if exists && !options.overwrite {
        tracing::info!("{} already exists, skipping download", path.display());
        return Ok(TransferResult {
            path,
            elapsed: started.elapsed(),
            bytes: 0,
            throughput: 0.0,
            concurrency: 0,
            chunks: 0,
            strategy: Strategy::Cached,
            checksum: ChecksumOutcome::Skipped,
            cdn: Cdn::Unknown,
        });
    }
    if verifies(asset, options) && asset.xx_hash().is_none() {
        return Err(TransferError::ChecksumMissing {
            asset_id: asset.id.clone(),
        });
    }
    if exists {
        tracing::debug!("removing existing {} before download", path.display());
        fs::remove_file(&path).await?;
    }

    let url = asset
        .download_url()
        .ok_or_else(|| TransferError::DownloadUnavailable {
            asset_id: asset.id.clone(),
        })?
        .to_string();
    let cdn = Cdn::classify(&url);

    let chunked = !asset.watermarked && options.multi_part && asset.filesize >= MULTIPART_THRESHOLD;
    let (bytes, chunks, concurrency, strategy) = if chunked {
        let concurrency = options.effective_concurrency();
        let (bytes, chunks) = download_chunked(job, asset, &url, &path, options).await?;
        (bytes, chunks, concurrency, Strategy::Chunked)
    } else {
        if asset.watermarked {
            tracing::debug!("asset {} is watermarked, using a single request", asset.id);
        }
        let bytes = download_whole(job, asset, &url, &path).await?;
        (bytes, 1, 1, Strategy::WholeFile)
    };

    let checksum = verify(asset, &path, options).await?;

    let elapsed = started.elapsed();
    let secs = elapsed.as_secs_f64();
    let throughput = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
    tracing::info!(
        "downloaded {} ({}) in {:.2}s at {} from {}",
        path.display(),
        format_size(bytes),
        secs,
        format_speed(throughput),
        cdn
    );

    Ok(TransferResult {
        path,
        elapsed,
        bytes,
        throughput,
        concurrency,
        chunks,
        strategy,
        checksum,
        cdn,
    })
}

async fn create_stub(path: &Path) -> Result<File, TransferError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => TransferError::LocalFileConflict(path.to_path_buf()),
            _ => TransferError::Io(e),
        })
}

fn ensure_status(resp: &HttpResponse, url: &str) -> Result<(), TransferError> {
    if resp.status().is_success() {
        return Ok(());
    }
    Err(TransferError::RequestFailed {
        status: resp.status().as_u16(),
        url: url.to_string(),
    })
}

async fn download_whole(job: &Job, asset: &Asset, url: &str, path: &Path) -> Result<u64, TransferError> {
    job.progress.begin(asset.filesize, 1);
    let session = job.sessions.checkout()?;
    let mut resp = session.send(HttpRequest::get(url)).await?;
    ensure_status(&resp, url)?;

    let mut file = create_stub(path).await?;
    let mut written = 0u64;
    while let Some(piece) = resp.chunk().await? {
        if job.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        file.write_all(&piece).await?;
        written += piece.len() as u64;
        job.progress.add_bytes(piece.len() as u64);
    }
    file.flush().await?;

    // Watermarked renditions are transcodes and differ in size from the original.
    if !asset.watermarked && asset.filesize > 0 && written != asset.filesize {
        return Err(TransferError::UnexpectedLength {
            expected: asset.filesize,
            actual: written,
        });
    }
    Ok(written)
}

async fn download_chunked(
    job: &Job,
    asset: &Asset,
    url: &str,
    path: &Path,
    options: &TransferOptions,
) -> Result<(u64, usize), TransferError> {
    create_stub(path).await?;

    let ranges = plan_by_size(asset.filesize, options.chunk_size)?;
    let chunks = ranges.len();
    tracing::debug!(
        "downloading asset {} in {} chunks with {} workers",
        asset.id,
        chunks,
        options.effective_concurrency()
    );
    job.progress.begin(asset.filesize, chunks);

    let tasks = ranges
        .into_iter()
        .map(|range| ChunkTask {
            url: url.to_string(),
            range,
        })
        .collect();

    let sessions = Arc::clone(&job.sessions);
    let progress = Arc::clone(&job.progress);
    let path = Arc::new(path.to_path_buf());
    let total = asset.filesize;

    let report = job
        .workers(options.effective_concurrency())
        .run(tasks, move |task| {
            let sessions = Arc::clone(&sessions);
            let progress = Arc::clone(&progress);
            let path = Arc::clone(&path);
            async move { fetch_range(&sessions, &progress, &path, task, total).await }
        })
        .await;

    let bytes = report.into_result()?;
    Ok((bytes, chunks))
}

/// Fetch one range and write it at its offset through a private file handle.
async fn fetch_range(
    sessions: &Arc<SessionPool>,
    progress: &TransferProgress,
    path: &Path,
    task: ChunkTask,
    total: u64,
) -> Result<u64, TransferError> {
    let range = task.range;
    let Some(header) = range.header_value() else {
        return Ok(0);
    };

    let session = sessions.checkout()?;
    let mut resp = session
        .send(HttpRequest::get(&task.url).header("Range", &header)?)
        .await?;

    let whole_file = range.start == 0 && range.len == total;
    let accepted = resp.status() == StatusCode::PARTIAL_CONTENT
        || (resp.status() == StatusCode::OK && whole_file);
    if !accepted {
        return Err(TransferError::RequestFailed {
            status: resp.status().as_u16(),
            url: task.url,
        });
    }

    let mut file = OpenOptions::new().write(true).open(path).await?;
    file.seek(SeekFrom::Start(range.start)).await?;

    let mut written = 0u64;
    while let Some(piece) = resp.chunk().await? {
        written += piece.len() as u64;
        if written > range.len {
            return Err(TransferError::UnexpectedLength {
                expected: range.len,
                actual: written,
            });
        }
        file.write_all(&piece).await?;
        progress.add_bytes(piece.len() as u64);
    }
    file.flush().await?;

    if written != range.len {
        return Err(TransferError::UnexpectedLength {
            expected: range.len,
            actual: written,
        });
    }
    Ok(written)
}

/// Watermarked renditions are transcodes, so their bytes never match the original's hash.
fn verifies(asset: &Asset, options: &TransferOptions) -> bool {
    options.verify_checksum && !asset.watermarked
}

async fn verify(asset: &Asset, path: &Path, options: &TransferOptions) -> Result<ChecksumOutcome, TransferError> {
    if !verifies(asset, options) {
        return Ok(ChecksumOutcome::Skipped);
    }
    let Some(expected) = asset.xx_hash() else {
        return Err(TransferError::ChecksumMissing {
            asset_id: asset.id.clone(),
        });
    };

    let owned = path.to_path_buf();
    let actual = tokio::task::spawn_blocking(move || frameio_core::hash_file(&owned))
        .await
        .map_err(|e| TransferError::TaskAborted(e.to_string()))??;

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(TransferError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    tracing::debug!("checksum {} verified for {}", actual, path.display());
    Ok(ChecksumOutcome::Verified)
}
