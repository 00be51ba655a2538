use serde::{Deserialize, Serialize};

/// Storage thresholds governing eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Ceiling on the total bytes recognized segments may occupy.
    pub max_reserved_bytes: u64,
    /// Free space floor; the hard constraint for a successful cycle.
    pub min_free_bytes: u64,
    /// When false the policy is inert and every check succeeds.
    pub eviction_enabled: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_reserved_bytes: 24 * 1024 * 1024,
            min_free_bytes: 1024 * 1024,
            eviction_enabled: true,
        }
    }
}

/// Point-in-time view of the store relative to the policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    pub capacity_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub segment_bytes: u64,
    pub segment_count: usize,
}

impl std::fmt::Display for StorageInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Storage: {} segments, {:.2}MB segment data, {:.2}MB free of {:.2}MB",
            self.segment_count,
            self.segment_bytes as f64 / 1024.0 / 1024.0,
            self.free_bytes as f64 / 1024.0 / 1024.0,
            self.capacity_bytes as f64 / 1024.0 / 1024.0,
        )
    }
}
