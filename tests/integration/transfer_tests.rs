use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use frameio_core::asset::Checksums;
use frameio_core::{hash_bytes, hash_file, verify_file, Asset, TransferOptions, MB};
use frameio_transfer::{
    ChecksumOutcome, Fault, MemoryTransport, RetryPolicy, Strategy, TransferClient, TransferError,
    TransferProgress,
};
use tokio_util::sync::CancellationToken;

const ORIGINAL: &str = "https://assets.frame.io/originals/a1/master.mov";

fn payload(len: u64) -> Bytes {
    Bytes::from((0..len).map(|i| (i.wrapping_mul(31) % 253) as u8).collect::<Vec<u8>>())
}

fn asset_for(data: &Bytes) -> Asset {
    Asset {
        id: "a1".into(),
        name: "master.mov".into(),
        asset_type: Some("file".into()),
        filesize: data.len() as u64,
        checksums: Some(Checksums {
            xx_hash: Some(hash_bytes(data)),
        }),
        original: Some(ORIGINAL.into()),
        upload_completed_at: Some("2021-06-01T12:00:00Z".into()),
        ..Default::default()
    }
}

fn fast_retries(attempts: u32) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_attempts(attempts)
        .with_backoff(Duration::ZERO, Duration::ZERO)
}

fn client(memory: &MemoryTransport) -> TransferClient {
    TransferClient::new(Arc::new(memory.clone())).with_retry_policy(fast_retries(3))
}

fn multi_part(chunk_size: u64, concurrency: usize) -> TransferOptions {
    TransferOptions::default()
        .with_multi_part(true)
        .with_chunk_size(chunk_size)
        .with_concurrency(concurrency)
}

// === Test 1: 100 MiB in 4 chunks is byte-identical to a single stream ===
#[tokio::test]
async fn test_chunked_download_matches_single_stream() {
    let data = payload(100 * MB);
    let memory = MemoryTransport::new();
    memory.insert_object(ORIGINAL, data.clone());
    let asset = asset_for(&data);

    let chunked_dir = tempfile::tempdir().unwrap();
    let chunked = client(&memory)
        .download(&asset, chunked_dir.path(), &multi_part(25 * MB, 4))
        .await
        .unwrap();
    assert_eq!(chunked.strategy, Strategy::Chunked);
    assert_eq!(chunked.chunks, 4);
    assert_eq!(memory.range_request_count(), 4);

    memory.clear_requests();
    let single_dir = tempfile::tempdir().unwrap();
    let single = client(&memory)
        .download(&asset, single_dir.path(), &TransferOptions::default())
        .await
        .unwrap();
    assert_eq!(single.strategy, Strategy::WholeFile);
    assert_eq!(memory.range_request_count(), 0);

    let expected = hash_bytes(&data);
    assert_eq!(hash_file(&chunked.path).unwrap(), expected);
    assert_eq!(hash_file(&single.path).unwrap(), expected);
    assert_eq!(chunked.checksum, ChecksumOutcome::Verified);
    assert_eq!(chunked.bytes, 100 * MB);
}

// === Test 2: watermarked assets never issue Range requests ===
#[tokio::test]
async fn test_watermarked_download_never_sends_range() {
    let rendition = payload(30 * MB);
    let memory = MemoryTransport::new();
    memory.insert_object("https://cdn.test/a1/h264_2160.mp4", rendition.clone());
    memory.insert_object("https://cdn.test/a1/h264_540.mp4", payload(10));

    let mut asset = asset_for(&payload(10));
    asset.original = None;
    asset.watermarked = true;
    asset.downloads.insert(
        "h264_2160".into(),
        Some("https://cdn.test/a1/h264_2160.mp4".into()),
    );
    asset.downloads.insert(
        "h264_540".into(),
        Some("https://cdn.test/a1/h264_540.mp4".into()),
    );

    let dir = tempfile::tempdir().unwrap();
    let result = client(&memory)
        .download(&asset, dir.path(), &multi_part(5 * MB, 5))
        .await
        .unwrap();

    assert_eq!(result.strategy, Strategy::WholeFile);
    assert_eq!(result.checksum, ChecksumOutcome::Skipped);
    assert_eq!(memory.range_request_count(), 0);
    assert_eq!(memory.request_count(), 1);
    assert_eq!(hash_file(&result.path).unwrap(), hash_bytes(&rendition));
}

// === Test 3: a second download of the same asset makes zero requests ===
#[tokio::test]
async fn test_download_is_idempotent() {
    let data = payload(MB);
    let memory = MemoryTransport::new();
    memory.insert_object(ORIGINAL, data.clone());
    let asset = asset_for(&data);
    let dir = tempfile::tempdir().unwrap();
    let client = client(&memory);

    let first = client
        .download(&asset, dir.path(), &TransferOptions::default())
        .await
        .unwrap();
    memory.clear_requests();

    let second = client
        .download(&asset, dir.path(), &TransferOptions::default())
        .await
        .unwrap();
    assert_eq!(second.strategy, Strategy::Cached);
    assert_eq!(second.path, first.path);
    assert_eq!(memory.request_count(), 0);
}

// === Test 4: a chunk that keeps failing surfaces as ChunkTransferFailed ===
#[tokio::test]
async fn test_permanent_server_error_fails_the_download() {
    let data = payload(40 * MB);
    let memory = MemoryTransport::new();
    memory.insert_object(ORIGINAL, data.clone());
    memory.inject_fault(ORIGINAL, Fault::Status(500), 1_000);

    let dir = tempfile::tempdir().unwrap();
    let asset = asset_for(&data);
    let err = client(&memory)
        .download(&asset, dir.path(), &multi_part(10 * MB, 2))
        .await
        .unwrap_err();

    match &err {
        TransferError::ChunkTransferFailed { total, failures } => {
            assert_eq!(*total, 4);
            assert_eq!(failures.len(), 4);
            assert!(failures
                .iter()
                .all(|f| matches!(f.error, TransferError::RequestFailed { status: 500, .. })));
        }
        other => panic!("expected ChunkTransferFailed, got {other}"),
    }
    // Every chunk used its full retry budget.
    assert_eq!(memory.request_count(), 12);
    // The partial file stays where it was written.
    let partial = dir.path().join(&asset.name);
    assert!(partial.exists());
    assert_eq!(std::fs::metadata(&partial).unwrap().len(), 0);
}

// === Test 5: one transient failure is absorbed by the retry policy ===
#[tokio::test]
async fn test_transient_failures_are_retried() {
    let data = payload(30 * MB);
    let memory = MemoryTransport::new();
    memory.insert_object(ORIGINAL, data.clone());
    memory.inject_fault(ORIGINAL, Fault::ConnectionReset, 1);
    memory.inject_fault(ORIGINAL, Fault::Status(503), 1);

    let dir = tempfile::tempdir().unwrap();
    let result = client(&memory)
        .download(&asset_for(&data), dir.path(), &multi_part(10 * MB, 3))
        .await
        .unwrap();
    assert_eq!(result.chunks, 3);
    assert_eq!(result.checksum, ChecksumOutcome::Verified);
    assert_eq!(memory.request_count(), 5);
}

// === Test 6: sessions are bounded by concurrency and reused ===
#[tokio::test]
async fn test_sessions_are_reused_per_worker() {
    let data = payload(32 * MB);
    let memory = MemoryTransport::new().with_latency(Duration::from_millis(5));
    memory.insert_object(ORIGINAL, data.clone());

    let dir = tempfile::tempdir().unwrap();
    let result = client(&memory)
        .download(&asset_for(&data), dir.path(), &multi_part(4 * MB, 2))
        .await
        .unwrap();

    assert_eq!(result.chunks, 8);
    assert!(memory.sessions_created() <= 2);
    assert!(memory.max_in_flight() <= 2);
}

// === Test 7: progress counters see every byte ===
#[tokio::test]
async fn test_progress_is_shared_with_caller() {
    let data = payload(26 * MB);
    let memory = MemoryTransport::new();
    memory.insert_object(ORIGINAL, data.clone());
    let progress = Arc::new(TransferProgress::new());

    let dir = tempfile::tempdir().unwrap();
    client(&memory)
        .with_progress(Arc::clone(&progress))
        .download(&asset_for(&data), dir.path(), &multi_part(13 * MB, 2))
        .await
        .unwrap();

    let snap = progress.snapshot();
    assert_eq!(snap.bytes_transferred, 26 * MB);
    assert_eq!(snap.total_bytes, 26 * MB);
    assert_eq!(snap.chunks_total, 2);
    assert_eq!(snap.chunks_completed, 2);
    assert_eq!(snap.percent(), 100.0);
}

// === Test 8: a cancelled client transfers nothing ===
#[tokio::test]
async fn test_cancelled_download_reports_every_chunk() {
    let data = payload(30 * MB);
    let memory = MemoryTransport::new();
    memory.insert_object(ORIGINAL, data.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let dir = tempfile::tempdir().unwrap();
    let err = client(&memory)
        .with_cancellation(cancel)
        .download(&asset_for(&data), dir.path(), &multi_part(10 * MB, 3))
        .await
        .unwrap_err();

    let failures = err.chunk_failures();
    assert_eq!(failures.len(), 3);
    assert!(failures
        .iter()
        .all(|f| matches!(f.error, TransferError::Cancelled)));
    assert_eq!(memory.request_count(), 0);
}

// === Test 9: uploaded parts reassemble into the original file ===
#[tokio::test]
async fn test_upload_parts_reassemble() {
    let data = payload(3 * MB + 17);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("render.mov");
    std::fs::write(&path, &data).unwrap();

    let urls: Vec<String> = (0..4)
        .map(|i| format!("https://frameio-uploads.s3.test/a1/part-{i}?sig=x"))
        .collect();
    let asset = Asset {
        id: "a1".into(),
        name: "render.mov".into(),
        filesize: data.len() as u64,
        filetype: Some("video/quicktime".into()),
        upload_urls: urls.clone(),
        ..Default::default()
    };

    let memory = MemoryTransport::new();
    let returned = client(&memory)
        .upload(&asset, &path, &TransferOptions::default().with_concurrency(2))
        .await
        .unwrap();
    assert_eq!(returned, asset);

    let mut joined = Vec::new();
    for url in &urls {
        joined.extend_from_slice(&memory.object(url).unwrap());
    }
    assert_eq!(hash_bytes(&joined), hash_bytes(&data));
    assert!(memory.max_in_flight() <= 2);
}

// === Test 10: hashing detects a single flipped byte ===
#[test]
fn test_hash_detects_one_byte_flip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.bin");
    let mut data = payload(9 * MB).to_vec();
    std::fs::write(&path, &data).unwrap();

    let digest = hash_file(&path).unwrap();
    assert_eq!(digest, hash_bytes(&data));
    assert!(verify_file(&path, &digest.to_uppercase()).unwrap());

    data[5 * MB as usize] ^= 0x01;
    std::fs::write(&path, &data).unwrap();
    assert!(!verify_file(&path, &digest).unwrap());
}

// === Test 11: a part that keeps failing surfaces as ChunkTransferFailed on upload ===
#[tokio::test]
async fn test_permanent_server_error_fails_the_upload() {
    let data = payload(MB);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("render.mov");
    std::fs::write(&path, &data).unwrap();

    let urls: Vec<String> = (0..4)
        .map(|i| format!("https://frameio-uploads.s3.test/a1/part-{i}?sig=x"))
        .collect();
    let asset = Asset {
        id: "a1".into(),
        name: "render.mov".into(),
        filesize: data.len() as u64,
        upload_urls: urls.clone(),
        ..Default::default()
    };

    let memory = MemoryTransport::new();
    memory.inject_fault(&urls[2], Fault::Status(500), 1_000);

    let err = client(&memory)
        .upload(&asset, &path, &TransferOptions::default().with_concurrency(2))
        .await
        .unwrap_err();

    match &err {
        TransferError::ChunkTransferFailed { total, failures } => {
            assert_eq!(*total, 4);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].range.index, 2);
            assert!(matches!(failures[0].error, TransferError::RequestFailed { status: 500, .. }));
        }
        other => panic!("expected ChunkTransferFailed, got {other}"),
    }

    let requests = memory.requests();
    let attempts = |url: &str| requests.iter().filter(|r| r.url == url).count();
    assert_eq!(attempts(&urls[2]), 3);
    for i in [0, 1, 3] {
        assert_eq!(attempts(&urls[i]), 1);
        assert!(memory.object(&urls[i]).is_some());
    }
    assert!(memory.object(&urls[2]).is_none());
}
