use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use frameio_core::units::{format_size, format_speed};
use frameio_core::{plan_parts, Asset, TransferOptions};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::client::Job;
use crate::error::TransferError;
use crate::http::HttpRequest;
use crate::pool::ChunkTask;
use crate::progress::TransferProgress;
use crate::session::SessionPool;

pub(crate) async fn run(
    job: &Job,
    asset: &Asset,
    local_file: &Path,
    options: &TransferOptions,
) -> Result<Asset, TransferError> {
    let started = Instant::now();

    if asset.upload_urls.is_empty() {
        return Err(TransferError::MissingUploadUrls {
            asset_id: asset.id.clone(),
        });
    }

    let size = fs::metadata(local_file).await?.len();
    if size != asset.filesize {
        return Err(TransferError::LocalSizeMismatch {
            expected: asset.filesize,
            actual: size,
        });
    }

    let ranges = plan_parts(size, asset.upload_urls.len())?;
    let last_index = ranges.len() - 1;
    job.progress.begin(size, ranges.len());
    tracing::debug!(
        "uploading {} as {} parts of asset {}",
        local_file.display(),
        ranges.len(),
        asset.id
    );

    let tasks = ranges
        .into_iter()
        .zip(&asset.upload_urls)
        .map(|(range, url)| ChunkTask {
            url: url.clone(),
            range,
        })
        .collect();

    let sessions = Arc::clone(&job.sessions);
    let progress = Arc::clone(&job.progress);
    let path = Arc::new(local_file.to_path_buf());
    let content_type: Arc<str> = Arc::from(asset.content_type());

    let report = job
        .workers(options.effective_concurrency())
        .run(tasks, move |task| {
            let sessions = Arc::clone(&sessions);
            let progress = Arc::clone(&progress);
            let path = Arc::clone(&path);
            let content_type = Arc::clone(&content_type);
            async move {
                let read_to_end = task.range.index == last_index;
                put_part(&sessions, &progress, &path, task, &content_type, read_to_end).await
            }
        })
        .await;

    let bytes = report.into_result()?;
    let secs = started.elapsed().as_secs_f64();
    let speed = if secs > 0.0 { bytes as f64 / secs } else { 0.0 };
    tracing::info!(
        "uploaded {} ({}) in {:.2}s at {}",
        local_file.display(),
        format_size(bytes),
        secs,
        format_speed(speed)
    );
    Ok(asset.clone())
}

async fn read_part(path: &Path, start: u64, len: u64, read_to_end: bool) -> Result<Bytes, TransferError> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;

    let mut buf = Vec::with_capacity(len as usize);
    if read_to_end {
        file.read_to_end(&mut buf).await?;
    } else {
        file.take(len).read_to_end(&mut buf).await?;
    }
    Ok(Bytes::from(buf))
}

async fn put_part(
    sessions: &Arc<SessionPool>,
    progress: &TransferProgress,
    path: &Path,
    task: ChunkTask,
    content_type: &str,
    read_to_end: bool,
) -> Result<u64, TransferError> {
    let body = read_part(path, task.range.start, task.range.len, read_to_end).await?;
    let sent = body.len() as u64;

    let session = sessions.checkout()?;
    let request = HttpRequest::put(&task.url, body)
        .header("content-type", content_type)?
        .header("x-amz-acl", "private")?;
    let resp = session.send(request).await?;
    if !resp.status().is_success() {
        return Err(TransferError::RequestFailed {
            status: resp.status().as_u16(),
            url: task.url,
        });
    }

    progress.add_bytes(sent);
    Ok(sent)
}
