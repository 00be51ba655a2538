use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

use crate::store::backend::SegmentStore;
use crate::store::error::{StoreError, StoreResult};
use crate::store::types::SegmentInfo;

const DEFAULT_SEGMENT_EXTENSION: &str = "avi";

/// Aggregate of one directory walk, cached until the next mutation.
#[derive(Debug, Clone)]
struct ScanCache {
    segments: Vec<SegmentInfo>,
    used_bytes: u64,
}

/// Directory-backed segment store.
///
/// Recognizes segments by file extension. `used_bytes` counts every file under
/// the root, segment or not, so the free-space figure reflects the whole
/// medium. Scan results are cached and invalidated on every mutation; callers
/// that know the recorder has written new files should call [`invalidate`]
/// before querying.
///
/// [`invalidate`]: FsSegmentStore::invalidate
pub struct FsSegmentStore {
    root: PathBuf,
    capacity_bytes: u64,
    extension: String,
    cache: RwLock<Option<ScanCache>>,
}

impl FsSegmentStore {
    pub fn new(root: impl AsRef<Path>, capacity_bytes: u64) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            capacity_bytes,
            extension: DEFAULT_SEGMENT_EXTENSION.to_string(),
            cache: RwLock::new(None),
        })
    }

    /// Recognize a different segment extension (without the leading dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Drop the cached scan so the next query re-reads the directory.
    pub fn invalidate(&self) {
        *self.cache.write() = None;
    }

    fn scan(&self) -> StoreResult<ScanCache> {
        let mut segments = Vec::new();
        let mut used_bytes = 0u64;

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            used_bytes += metadata.len();

            let path = entry.path();
            let is_segment = path
                .extension()
                .map(|e| e.eq_ignore_ascii_case(self.extension.as_str()))
                .unwrap_or(false);
            if is_segment {
                let modified_at: DateTime<Utc> = metadata
                    .modified()
                    .map(DateTime::from)
                    .unwrap_or_else(|_| Utc::now());
                segments.push(SegmentInfo {
                    path,
                    size_bytes: metadata.len(),
                    modified_at,
                });
            }
        }

        segments.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(ScanCache {
            segments,
            used_bytes,
        })
    }

    fn snapshot(&self) -> StoreResult<ScanCache> {
        if let Some(cache) = self.cache.read().as_ref() {
            return Ok(cache.clone());
        }
        let fresh = self.scan()?;
        *self.cache.write() = Some(fresh.clone());
        Ok(fresh)
    }
}

impl SegmentStore for FsSegmentStore {
    type Reader = tokio::fs::File;

    fn list(&self) -> StoreResult<Vec<SegmentInfo>> {
        Ok(self.snapshot()?.segments)
    }

    fn stat(&self, path: &Path) -> StoreResult<SegmentInfo> {
        self.snapshot()?
            .segments
            .into_iter()
            .find(|s| s.path == path)
            .ok_or_else(|| StoreError::NotFound(path.to_path_buf()))
    }

    fn open(&self, path: &Path) -> StoreResult<Self::Reader> {
        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::Io(e)
            }
        })?;
        Ok(tokio::fs::File::from_std(file))
    }

    fn delete(&self, path: &Path) -> StoreResult<()> {
        let result = std::fs::remove_file(path).map_err(|e| StoreError::DeleteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        });
        self.invalidate();
        result
    }

    fn used_bytes(&self) -> StoreResult<u64> {
        Ok(self.snapshot()?.used_bytes)
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
}
