use std::path::Path;

use tokio::io::AsyncRead;

use crate::store::error::StoreResult;
use crate::store::types::SegmentInfo;

/// Ordered file store holding recorded segments.
///
/// Segments are created by the recording subsystem; the retention manager and
/// the upload pipeline only ever read and delete them.
pub trait SegmentStore {
    type Reader: AsyncRead + Unpin + Send;

    /// List all recognized segments.
    fn list(&self) -> StoreResult<Vec<SegmentInfo>>;

    /// Look up a single segment by path.
    fn stat(&self, path: &Path) -> StoreResult<SegmentInfo>;

    /// Open a segment for streaming reads.
    fn open(&self, path: &Path) -> StoreResult<Self::Reader>;

    /// Delete a segment.
    fn delete(&self, path: &Path) -> StoreResult<()>;

    /// Total bytes in use on the underlying medium (segments or not).
    fn used_bytes(&self) -> StoreResult<u64>;

    /// Total capacity of the underlying medium.
    fn capacity_bytes(&self) -> u64;

    fn free_bytes(&self) -> StoreResult<u64> {
        Ok(self.capacity_bytes().saturating_sub(self.used_bytes()?))
    }
}
