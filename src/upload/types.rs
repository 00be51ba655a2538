use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upload pipeline configuration. Changes take effect on the next transfer
/// attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub endpoint_url: String,
    pub auth_token: Option<String>,
    /// Read-then-write buffer size for streaming the segment body.
    pub chunk_buffer_bytes: usize,
    pub response_timeout: Duration,
    /// Total transfer attempts per segment before it is abandoned.
    pub max_retries: u32,
    pub use_tls: bool,
    pub delete_on_success: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint_url: String::new(),
            auth_token: None,
            chunk_buffer_bytes: 1024,
            response_timeout: Duration::from_secs(30),
            max_retries: 3,
            use_tls: false,
            delete_on_success: true,
        }
    }
}

/// Observable snapshot of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStatus {
    pub active: bool,
    pub paused: bool,
    pub current_path: Option<PathBuf>,
    pub bytes_sent: u64,
    pub total_bytes: u64,
    pub queued: usize,
}

/// Terminal outcome of one segment's pass through the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { path: PathBuf },
    Abandoned { path: PathBuf, attempts: u32 },
}
