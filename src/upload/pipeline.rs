use metrics::{counter, gauge};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;

use crate::store::SegmentStore;
use crate::transport::{Connector, LinkMonitor};
use crate::upload::error::{TransferError, TransferResult};
use crate::upload::queue::UploadQueue;
use crate::upload::schedule::CaptureTiming;
use crate::upload::session::UploadSession;
use crate::upload::types::{UploadConfig, UploadOutcome, UploadStatus};
use crate::wire::{request_head, Endpoint, MultipartEncoding, ResponseParser};

/// Minimum spacing between transfer attempts across driver cycles.
const MIN_ATTEMPT_INTERVAL: Duration = Duration::from_secs(5);
/// Backoff before retry `n` is `RETRY_BACKOFF_BASE * n`.
const RETRY_BACKOFF_BASE: Duration = Duration::from_secs(2);
/// Pause is advised when the next capture is closer than this.
const PAUSE_GUARD_WINDOW: Duration = Duration::from_secs(5);
const WATCHDOG_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const STUCK_SESSION_CEILING: Duration = Duration::from_secs(300);

/// Drives one-at-a-time segment uploads from a FIFO queue.
///
/// A periodic driver calls [`process_queue`] once per cycle; everything else
/// is control surface. All methods take `&self` and synchronize through
/// short-lived interior locks, so a control task can pause or reconfigure
/// while a transfer is in flight; the transfer observes the pause flag at
/// chunk boundaries.
///
/// [`process_queue`]: UploadPipeline::process_queue
pub struct UploadPipeline<S, C, L> {
    store: Arc<S>,
    connector: C,
    link: L,
    config: RwLock<UploadConfig>,
    queue: Arc<RwLock<UploadQueue>>,
    session: RwLock<UploadSession>,
}

impl<S, C, L> UploadPipeline<S, C, L>
where
    S: SegmentStore,
    C: Connector,
    L: LinkMonitor,
{
    pub fn new(store: Arc<S>, connector: C, link: L, config: UploadConfig) -> Self {
        Self {
            store,
            connector,
            link,
            config: RwLock::new(config),
            queue: Arc::new(RwLock::new(UploadQueue::new())),
            session: RwLock::new(UploadSession::new()),
        }
    }

    /// Queue a segment path for transfer. Idempotent.
    pub fn enqueue(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let added = self.queue.write().enqueue(path.clone());
        if added {
            tracing::debug!("queued segment {} for upload", path.display());
            gauge!("cliprelay_upload_queue_depth").set(self.queue_len() as f64);
        }
        added
    }

    /// Enqueue every recognized segment in the store; recovers queue contents
    /// after a restart. Returns how many entries were newly added.
    pub fn rescan_store(&self) -> crate::store::StoreResult<usize> {
        let segments = self.store.list()?;
        let mut added = 0;
        {
            let mut queue = self.queue.write();
            for segment in segments {
                if queue.enqueue(segment.path) {
                    added += 1;
                }
            }
        }
        if added > 0 {
            tracing::info!("rescan queued {} segments for upload", added);
            gauge!("cliprelay_upload_queue_depth").set(self.queue_len() as f64);
        }
        Ok(added)
    }

    pub fn clear_queue(&self) {
        self.queue.write().clear();
        gauge!("cliprelay_upload_queue_depth").set(0.0);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.read().len()
    }

    /// Shared queue handle for the retention manager's reconciliation pass.
    pub fn queue_handle(&self) -> Arc<RwLock<UploadQueue>> {
        Arc::clone(&self.queue)
    }

    pub fn status(&self) -> UploadStatus {
        self.session.read().snapshot(self.queue_len())
    }

    // Config setters; each takes effect on the next transfer attempt.

    pub fn set_endpoint_url(&self, url: impl Into<String>) {
        self.config.write().endpoint_url = url.into();
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        self.config.write().auth_token = token;
    }

    pub fn set_chunk_buffer_bytes(&self, bytes: usize) {
        self.config.write().chunk_buffer_bytes = bytes;
    }

    pub fn set_response_timeout(&self, timeout: Duration) {
        self.config.write().response_timeout = timeout;
    }

    pub fn set_max_retries(&self, retries: u32) {
        self.config.write().max_retries = retries;
    }

    pub fn set_use_tls(&self, use_tls: bool) {
        self.config.write().use_tls = use_tls;
    }

    pub fn set_delete_on_success(&self, delete: bool) {
        self.config.write().delete_on_success = delete;
    }

    /// Advisory: should the caller pause uploads to protect the next capture?
    pub fn should_pause_upload(&self, timing: &CaptureTiming) -> bool {
        let remaining = timing.time_until_next_capture(Instant::now());
        let pause = remaining <= PAUSE_GUARD_WINDOW;
        tracing::debug!(
            "time until next capture {:?}, pause advised: {}",
            remaining,
            pause
        );
        pause
    }

    /// Pause the in-flight transfer. No-op while idle.
    pub fn pause_upload(&self) {
        if self.session.write().pause() {
            tracing::info!("upload paused for recording priority");
        }
    }

    pub fn resume_upload(&self) {
        if self.session.write().resume() {
            tracing::info!("upload resumed");
        }
    }

    /// Clear the pause overlay once the recorder is outside its capture window.
    pub fn force_resume_uploads(&self, timing: &CaptureTiming) {
        if self.session.read().is_paused() && !timing.in_capture_window(Instant::now()) {
            self.resume_upload();
        }
    }

    /// Watchdog against a wedged transport: clears a session that has sat
    /// active past the stuck ceiling. Inspects at most once per interval.
    pub fn reset_stuck_upload_state(&self) -> bool {
        self.session.write().reset_if_stuck(
            Instant::now(),
            WATCHDOG_CHECK_INTERVAL,
            STUCK_SESSION_CEILING,
        )
    }

    /// One queue-processing step; the driver calls this once per cycle.
    ///
    /// Transfers the head segment with retries and removes it from the queue
    /// whatever the outcome — a segment either uploads this cycle or is
    /// abandoned. Returns `None` when nothing was attempted (link down,
    /// empty queue, single-flight, paused, or throttled).
    pub async fn process_queue(&self) -> Option<UploadOutcome> {
        if !self.link.is_network_available() {
            return None;
        }
        if self.queue.read().is_empty() {
            return None;
        }
        if self.session.read().is_active() {
            return None;
        }

        if self.session.read().is_paused() {
            self.resume_upload();
            if self.session.read().is_paused() {
                return None;
            }
        }

        let now = Instant::now();
        if let Some(last) = self.session.read().last_attempt() {
            let since = now.duration_since(last);
            if since < MIN_ATTEMPT_INTERVAL {
                tracing::debug!("throttling uploads, last attempt {:?} ago", since);
                return None;
            }
        }

        let path = self.queue.read().front().cloned()?;
        self.session.write().begin(path.clone(), now);
        tracing::info!("processing upload: {}", path.display());

        let max_retries = self.config.read().max_retries;
        let mut attempt = 0u32;
        let mut succeeded = false;

        while attempt < max_retries && !succeeded {
            if self.session.read().is_paused() {
                tracing::info!("pause requested, aborting retries for {}", path.display());
                break;
            }
            if attempt > 0 {
                tracing::info!("retry attempt {} for {}", attempt, path.display());
                counter!("cliprelay_upload_retries_total").increment(1);
                tokio::time::sleep(RETRY_BACKOFF_BASE * attempt).await;
            }

            match self.transfer_segment(&path).await {
                Ok(()) => succeeded = true,
                Err(e) => {
                    tracing::warn!(
                        "upload attempt {} failed for {}: {}",
                        attempt + 1,
                        path.display(),
                        e
                    );
                    attempt += 1;
                    if !self.link.is_network_available() {
                        tracing::warn!("link down, abandoning retries for {}", path.display());
                        break;
                    }
                }
            }
        }

        self.queue.write().remove(&path);
        gauge!("cliprelay_upload_queue_depth").set(self.queue_len() as f64);
        self.session.write().finish();

        let outcome = if succeeded {
            tracing::info!("upload completed: {}", path.display());
            counter!("cliprelay_uploads_completed_total").increment(1);
            UploadOutcome::Uploaded { path }
        } else {
            tracing::warn!("upload abandoned after {} attempts: {}", attempt, path.display());
            counter!("cliprelay_uploads_abandoned_total").increment(1);
            UploadOutcome::Abandoned { path, attempts: attempt }
        };
        Some(outcome)
    }

    /// One transfer attempt: stream the segment as a multipart POST over a
    /// fresh connection and require a 2xx response. Aborted attempts are
    /// never resumed; the next attempt restarts from byte zero.
    async fn transfer_segment(&self, path: &Path) -> TransferResult<()> {
        let config = self.config.read().clone();
        if self.session.read().is_paused() {
            return Err(TransferError::Paused);
        }

        let segment = self.store.stat(path)?;
        let mut reader = self.store.open(path)?;
        self.session.write().start_attempt(segment.size_bytes);
        tracing::info!(
            "starting upload: {} ({:.2}MB)",
            path.display(),
            segment.size_bytes as f64 / 1024.0 / 1024.0
        );

        let endpoint = Endpoint::parse(&config.endpoint_url)?;
        let mut conn = self
            .connector
            .connect(&endpoint.host, endpoint.port, config.use_tls)
            .await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let encoding = MultipartEncoding::for_file(&file_name);
        let content_length = encoding.content_length(segment.size_bytes);

        let head = request_head(
            &endpoint,
            encoding.boundary(),
            content_length,
            config.auth_token.as_deref(),
        );
        conn.write_all(head.as_bytes()).await?;
        conn.write_all(encoding.prologue()).await?;

        let mut buf = vec![0u8; config.chunk_buffer_bytes.max(1)];
        let mut remaining = segment.size_bytes;
        while remaining > 0 {
            if self.session.read().is_paused() {
                return Err(TransferError::Paused);
            }
            let want = remaining.min(buf.len() as u64) as usize;
            let n = reader.read(&mut buf[..want]).await?;
            if n == 0 {
                return Err(TransferError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "segment truncated mid-read",
                )));
            }
            conn.write_all(&buf[..n]).await?;
            remaining -= n as u64;
            self.session.write().record_progress(n as u64);
            counter!("cliprelay_bytes_uploaded_total").increment(n as u64);
        }

        conn.write_all(encoding.epilogue()).await?;
        conn.flush().await?;

        let response = tokio::time::timeout(
            config.response_timeout,
            ResponseParser::read_from(&mut conn),
        )
        .await
        .map_err(|_| TransferError::ResponseTimeout)??;

        let status = response
            .status_code()
            .ok_or(TransferError::MalformedResponse)?;
        if status != 200 && status != 201 {
            return Err(TransferError::RejectedStatus(status));
        }

        if config.delete_on_success {
            match self.store.delete(path) {
                Ok(()) => tracing::info!("deleted uploaded segment {}", path.display()),
                Err(e) => {
                    // The collector already has the data; success stands.
                    tracing::warn!(
                        "failed to delete uploaded segment {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }
        Ok(())
    }
}
