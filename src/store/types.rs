use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One recorded segment as seen by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Last-modified time; eviction orders segments by this key.
    pub modified_at: DateTime<Utc>,
}
