use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::store::backend::SegmentStore;
use crate::store::error::{StoreError, StoreResult};
use crate::store::types::SegmentInfo;

#[derive(Debug, Clone)]
struct MemFile {
    data: Bytes,
    modified_at: DateTime<Utc>,
}

/// In-memory segment store for tests and simulations.
///
/// Modified times are supplied by the caller, `extra_used_bytes` models
/// non-segment usage of the medium, and `fail_deletes` forces the delete path
/// to error for exercising eviction aborts.
pub struct MemorySegmentStore {
    capacity_bytes: u64,
    files: RwLock<BTreeMap<PathBuf, MemFile>>,
    extra_used_bytes: AtomicU64,
    fail_deletes: AtomicBool,
}

impl MemorySegmentStore {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            capacity_bytes,
            files: RwLock::new(BTreeMap::new()),
            extra_used_bytes: AtomicU64::new(0),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn insert(
        &self,
        path: impl Into<PathBuf>,
        data: impl Into<Bytes>,
        modified_at: DateTime<Utc>,
    ) {
        self.files.write().insert(
            path.into(),
            MemFile {
                data: data.into(),
                modified_at,
            },
        );
    }

    /// Insert a segment of the given size with zeroed contents.
    pub fn insert_sized(&self, path: impl Into<PathBuf>, size: usize, modified_at: DateTime<Utc>) {
        self.insert(path, vec![0u8; size], modified_at);
    }

    pub fn set_extra_used_bytes(&self, bytes: u64) {
        self.extra_used_bytes.store(bytes, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    pub fn segment_count(&self) -> usize {
        self.files.read().len()
    }
}

impl SegmentStore for MemorySegmentStore {
    type Reader = Cursor<Bytes>;

    fn list(&self) -> StoreResult<Vec<SegmentInfo>> {
        Ok(self
            .files
            .read()
            .iter()
            .map(|(path, file)| SegmentInfo {
                path: path.clone(),
                size_bytes: file.data.len() as u64,
                modified_at: file.modified_at,
            })
            .collect())
    }

    fn stat(&self, path: &Path) -> StoreResult<SegmentInfo> {
        self.files
            .read()
            .get(path)
            .map(|file| SegmentInfo {
                path: path.to_path_buf(),
                size_bytes: file.data.len() as u64,
                modified_at: file.modified_at,
            })
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn open(&self, path: &Path) -> StoreResult<Self::Reader> {
        self.files
            .read()
            .get(path)
            .map(|file| Cursor::new(file.data.clone()))
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn delete(&self, path: &Path) -> StoreResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::DeleteFailed {
                path: path.to_path_buf(),
                reason: "deletes disabled".into(),
            });
        }
        self.files
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn used_bytes(&self) -> StoreResult<u64> {
        let segments: u64 = self.files.read().values().map(|f| f.data.len() as u64).sum();
        Ok(segments + self.extra_used_bytes.load(Ordering::SeqCst))
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
}
