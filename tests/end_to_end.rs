use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use cliprelay::retention::{RetentionManager, RetentionPolicy};
use cliprelay::store::FsSegmentStore;
use cliprelay::transport::{SharedLink, TcpConnector};
use cliprelay::upload::{UploadConfig, UploadOutcome, UploadPipeline};

const MB: u64 = 1024 * 1024;

/// Minimal collector: accepts one connection, consumes the request until the
/// multipart epilogue, replies 200, and hands back the raw request bytes.
async fn spawn_collector() -> (u16, Arc<Mutex<Vec<Vec<u8>>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let captured = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                break;
            };
            let captured = Arc::clone(&captured);
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                let mut request = Vec::new();
                loop {
                    match sock.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            request.extend_from_slice(&buf[..n]);
                            if request.ends_with(b"--\r\n") {
                                captured.lock().push(std::mem::take(&mut request));
                                sock.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok")
                                    .await
                                    .ok();
                                sock.shutdown().await.ok();
                                return;
                            }
                        }
                    }
                }
                captured.lock().push(request);
            });
        }
    });

    (port, requests)
}

fn write_segment(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

fn upload_config(port: u16) -> UploadConfig {
    UploadConfig {
        endpoint_url: format!("http://127.0.0.1:{port}/upload"),
        ..UploadConfig::default()
    }
}

#[tokio::test]
async fn test_full_upload_workflow() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FsSegmentStore::new(temp_dir.path(), 64 * MB).unwrap());
    let segment = write_segment(temp_dir.path(), "clip_0001.avi", 10 * 1024);
    store.invalidate();

    let (port, requests) = spawn_collector().await;
    let pipeline = UploadPipeline::new(
        Arc::clone(&store),
        TcpConnector::new(),
        SharedLink::new(true),
        upload_config(port),
    );

    assert_eq!(pipeline.rescan_store().unwrap(), 1);
    let outcome = pipeline.process_queue().await;
    assert_eq!(
        outcome,
        Some(UploadOutcome::Uploaded {
            path: segment.clone()
        })
    );

    // deleteOnSuccess removed the file, the queue drained, session is idle.
    assert!(!segment.exists());
    assert_eq!(pipeline.queue_len(), 0);
    let status = pipeline.status();
    assert!(!status.active);
    assert!(!status.paused);
    assert!(status.current_path.is_none());

    // The collector saw one well-formed multipart POST carrying the payload.
    let requests = requests.lock().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    let head = String::from_utf8_lossy(request);
    assert!(head.starts_with("POST /upload HTTP/1.1\r\n"));
    assert!(head.contains("Content-Type: multipart/form-data; boundary="));
    assert!(head.contains("filename=\"clip_0001.avi\""));
    let payload: Vec<u8> = (0..10 * 1024).map(|i| (i % 251) as u8).collect();
    assert!(request
        .windows(payload.len())
        .any(|window| window == payload.as_slice()));
}

#[tokio::test]
async fn test_unreachable_collector_abandons_head_only() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FsSegmentStore::new(temp_dir.path(), 64 * MB).unwrap());
    let x = write_segment(temp_dir.path(), "x.avi", 2048);
    let y = write_segment(temp_dir.path(), "y.avi", 2048);
    store.invalidate();

    // Nothing listens on this port; every connect is refused.
    let mut config = upload_config(1);
    config.max_retries = 2;

    let pipeline = UploadPipeline::new(
        Arc::clone(&store),
        TcpConnector::new(),
        SharedLink::new(true),
        config,
    );
    pipeline.enqueue(x.clone());
    pipeline.enqueue(y.clone());

    let outcome = pipeline.process_queue().await;
    assert_eq!(
        outcome,
        Some(UploadOutcome::Abandoned {
            path: x.clone(),
            attempts: 2
        })
    );

    // `y` was not touched in the same call and stays queued; `x` stays on disk.
    assert_eq!(pipeline.queue_len(), 1);
    assert!(x.exists());
    assert!(y.exists());
}

#[tokio::test]
async fn test_eviction_reconciles_pipeline_queue() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FsSegmentStore::new(temp_dir.path(), 64 * MB).unwrap());

    // Created oldest-first; equal-mtime ties resolve by path order.
    let old = write_segment(temp_dir.path(), "seg_a.avi", MB as usize);
    let mid = write_segment(temp_dir.path(), "seg_b.avi", 2 * MB as usize);
    let new = write_segment(temp_dir.path(), "seg_c.avi", MB as usize);
    store.invalidate();

    let (port, _requests) = spawn_collector().await;
    let pipeline = UploadPipeline::new(
        Arc::clone(&store),
        TcpConnector::new(),
        SharedLink::new(true),
        upload_config(port),
    );
    assert_eq!(pipeline.rescan_store().unwrap(), 3);

    let retention = RetentionManager::new(
        Arc::clone(&store),
        RetentionPolicy {
            max_reserved_bytes: 3 * MB,
            min_free_bytes: MB,
            eviction_enabled: true,
        },
    );

    let queue = pipeline.queue_handle();
    assert!(retention.check_and_manage_storage(Some(&queue)));

    // 4MB of segments against a 3MB ceiling: exactly the oldest goes.
    assert!(!old.exists());
    assert!(mid.exists());
    assert!(new.exists());
    assert_eq!(pipeline.queue_len(), 2);
    assert!(!queue.read().contains(&old));

    // The pipeline keeps working against the reconciled queue.
    let outcome = pipeline.process_queue().await;
    assert_eq!(outcome, Some(UploadOutcome::Uploaded { path: mid }));
}

#[tokio::test]
async fn test_rescan_recovers_queue_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    write_segment(temp_dir.path(), "a.avi", 1024);
    write_segment(temp_dir.path(), "b.avi", 1024);
    write_segment(temp_dir.path(), "ignored.tmp", 1024);

    // A fresh pipeline over an existing directory starts empty.
    let store = Arc::new(FsSegmentStore::new(temp_dir.path(), 64 * MB).unwrap());
    let pipeline = UploadPipeline::new(
        store,
        TcpConnector::new(),
        SharedLink::new(true),
        upload_config(1),
    );
    assert_eq!(pipeline.queue_len(), 0);

    assert_eq!(pipeline.rescan_store().unwrap(), 2);
    assert_eq!(pipeline.rescan_store().unwrap(), 0);
    assert_eq!(pipeline.queue_len(), 2);
}
