use metrics::counter;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::store::{SegmentInfo, SegmentStore, StoreResult};
use crate::retention::types::{RetentionPolicy, StorageInfo};
use crate::upload::UploadQueue;

/// Enforces the capacity and free-space invariants over a segment store.
///
/// Approximates a circular buffer over time: whenever thresholds are
/// violated, the least-recently-modified segment is deleted until the store
/// is back within policy or a single segment remains. When the upload queue
/// is supplied, an evicted segment is also dequeued so the pipeline never
/// tries to open a file that no longer exists.
pub struct RetentionManager<S> {
    store: Arc<S>,
    policy: RwLock<RetentionPolicy>,
}

struct Measurement {
    segments: Vec<SegmentInfo>,
    free_bytes: u64,
    segment_bytes: u64,
}

impl<S: SegmentStore> RetentionManager<S> {
    pub fn new(store: Arc<S>, policy: RetentionPolicy) -> Self {
        Self {
            store,
            policy: RwLock::new(policy),
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        *self.policy.read()
    }

    pub fn set_policy(&self, policy: RetentionPolicy) {
        *self.policy.write() = policy;
    }

    pub fn set_max_reserved_bytes(&self, bytes: u64) {
        self.policy.write().max_reserved_bytes = bytes;
    }

    pub fn set_min_free_bytes(&self, bytes: u64) {
        self.policy.write().min_free_bytes = bytes;
    }

    pub fn set_eviction_enabled(&self, enabled: bool) {
        self.policy.write().eviction_enabled = enabled;
    }

    /// Bring the store back within policy, evicting oldest segments first.
    ///
    /// Returns whether free space meets the configured floor afterwards.
    /// Reserved-size overflow alone does not fail the call; free space is
    /// the hard constraint. At least one segment is always retained.
    pub fn check_and_manage_storage(&self, queue: Option<&RwLock<UploadQueue>>) -> bool {
        let policy = self.policy();
        if !policy.eviction_enabled {
            return true;
        }

        let mut measurement = match self.measure() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("storage measurement failed: {}", e);
                return false;
            }
        };

        let mut need_cleanup = measurement.free_bytes < policy.min_free_bytes
            || measurement.segment_bytes > policy.max_reserved_bytes;

        while need_cleanup && measurement.segments.len() > 1 {
            let Some(victim) = oldest_segment(&measurement.segments) else {
                tracing::warn!("cleanup needed but no segment left to evict");
                break;
            };
            let victim = victim.clone();

            if let Some(queue) = queue {
                if queue.write().remove(&victim.path) {
                    tracing::info!("dequeued evicted segment {}", victim.path.display());
                }
            }

            match self.store.delete(&victim.path) {
                Ok(()) => {
                    tracing::info!(
                        "evicted oldest segment {} ({} bytes)",
                        victim.path.display(),
                        victim.size_bytes
                    );
                    counter!("cliprelay_segments_evicted_total").increment(1);
                    counter!("cliprelay_bytes_evicted_total").increment(victim.size_bytes);
                }
                Err(e) => {
                    tracing::warn!("failed to evict {}: {}", victim.path.display(), e);
                    break;
                }
            }

            measurement = match self.measure() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("storage measurement failed: {}", e);
                    return false;
                }
            };
            need_cleanup = measurement.free_bytes < policy.min_free_bytes
                || measurement.segment_bytes > policy.max_reserved_bytes;
        }

        measurement.free_bytes >= policy.min_free_bytes
    }

    /// Snapshot of store usage relative to capacity.
    pub fn storage_info(&self) -> StoreResult<StorageInfo> {
        let measurement = self.measure()?;
        let capacity = self.store.capacity_bytes();
        Ok(StorageInfo {
            capacity_bytes: capacity,
            used_bytes: capacity.saturating_sub(measurement.free_bytes),
            free_bytes: measurement.free_bytes,
            segment_bytes: measurement.segment_bytes,
            segment_count: measurement.segments.len(),
        })
    }

    fn measure(&self) -> StoreResult<Measurement> {
        let segments = self.store.list()?;
        let segment_bytes = segments.iter().map(|s| s.size_bytes).sum();
        let free_bytes = self.store.free_bytes()?;
        Ok(Measurement {
            segments,
            free_bytes,
            segment_bytes,
        })
    }
}

fn oldest_segment(segments: &[SegmentInfo]) -> Option<&SegmentInfo> {
    segments.iter().min_by(|a, b| {
        a.modified_at
            .cmp(&b.modified_at)
            .then_with(|| a.path.cmp(&b.path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySegmentStore;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use rand::seq::SliceRandom;
    use std::path::{Path, PathBuf};

    const MB: u64 = 1024 * 1024;

    fn at(minute: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + ChronoDuration::minutes(minute)
    }

    fn manager(
        store: Arc<MemorySegmentStore>,
        max_reserved: u64,
        min_free: u64,
    ) -> RetentionManager<MemorySegmentStore> {
        RetentionManager::new(
            store,
            RetentionPolicy {
                max_reserved_bytes: max_reserved,
                min_free_bytes: min_free,
                eviction_enabled: true,
            },
        )
    }

    #[test]
    fn test_within_policy_deletes_nothing() {
        let store = Arc::new(MemorySegmentStore::new(100 * MB));
        store.insert_sized("/a.avi", MB as usize, at(0));
        store.insert_sized("/b.avi", MB as usize, at(1));

        let mgr = manager(store.clone(), 10 * MB, MB);
        assert!(mgr.check_and_manage_storage(None));
        assert_eq!(store.segment_count(), 2);
    }

    #[test]
    fn test_reserved_overflow_evicts_oldest_and_stops() {
        // a (1MB, oldest), b (2MB), c (1MB, newest); max reserved 3MB.
        let store = Arc::new(MemorySegmentStore::new(100 * MB));
        store.insert_sized("/a.avi", MB as usize, at(0));
        store.insert_sized("/b.avi", 2 * MB as usize, at(1));
        store.insert_sized("/c.avi", MB as usize, at(2));

        let mgr = manager(store.clone(), 3 * MB, MB);
        assert!(mgr.check_and_manage_storage(None));

        assert!(!store.contains(Path::new("/a.avi")));
        assert!(store.contains(Path::new("/b.avi")));
        assert!(store.contains(Path::new("/c.avi")));
        assert_eq!(store.segment_count(), 2);
    }

    #[test]
    fn test_one_segment_floor() {
        let store = Arc::new(MemorySegmentStore::new(10 * MB));
        store.insert_sized("/only.avi", 8 * MB as usize, at(0));

        // Thresholds impossible to satisfy, yet the last segment survives.
        let mgr = manager(store.clone(), MB, 5 * MB);
        assert!(!mgr.check_and_manage_storage(None));
        assert_eq!(store.segment_count(), 1);
    }

    #[test]
    fn test_low_free_space_evicts_until_floor_met() {
        let store = Arc::new(MemorySegmentStore::new(10 * MB));
        for i in 0..5 {
            store.insert_sized(format!("/s{i}.avi"), MB as usize, at(i));
        }
        store.set_extra_used_bytes(4 * MB);

        // free = 10 - 5 - 4 = 1MB < 3MB floor; each eviction frees 1MB.
        let mgr = manager(store.clone(), 100 * MB, 3 * MB);
        assert!(mgr.check_and_manage_storage(None));

        assert!(store.free_bytes().unwrap() >= 3 * MB);
        assert!(!store.contains(Path::new("/s0.avi")));
        assert!(!store.contains(Path::new("/s1.avi")));
        assert!(store.contains(Path::new("/s4.avi")));
    }

    #[test]
    fn test_oldest_first_under_random_timestamps() {
        let mut minutes: Vec<i64> = (0..20).collect();
        minutes.shuffle(&mut rand::thread_rng());

        let store = Arc::new(MemorySegmentStore::new(100 * MB));
        for (i, minute) in minutes.iter().enumerate() {
            store.insert_sized(format!("/seg{i:02}.avi"), MB as usize, at(*minute));
        }

        // Force exactly one eviction.
        let mgr = manager(store.clone(), 19 * MB, MB);
        assert!(mgr.check_and_manage_storage(None));

        let survivors = store.list().unwrap();
        assert_eq!(survivors.len(), 19);
        // The minimum timestamp among survivors is the second-oldest overall.
        let evicted_minute = minutes.iter().min().unwrap();
        assert!(survivors.iter().all(|s| s.modified_at > at(*evicted_minute)));
    }

    #[test]
    fn test_eviction_removes_victim_from_queue() {
        let store = Arc::new(MemorySegmentStore::new(100 * MB));
        store.insert_sized("/old.avi", 2 * MB as usize, at(0));
        store.insert_sized("/new.avi", MB as usize, at(1));

        let queue = RwLock::new(UploadQueue::new());
        queue.write().enqueue(PathBuf::from("/old.avi"));
        queue.write().enqueue(PathBuf::from("/new.avi"));

        let mgr = manager(store.clone(), 2 * MB, MB);
        assert!(mgr.check_and_manage_storage(Some(&queue)));

        assert!(!queue.read().contains(Path::new("/old.avi")));
        assert!(queue.read().contains(Path::new("/new.avi")));
        assert_eq!(queue.read().len(), 1);
    }

    #[test]
    fn test_delete_failure_aborts_cycle() {
        let store = Arc::new(MemorySegmentStore::new(10 * MB));
        store.insert_sized("/a.avi", 4 * MB as usize, at(0));
        store.insert_sized("/b.avi", 4 * MB as usize, at(1));
        store.set_fail_deletes(true);

        let mgr = manager(store.clone(), MB, 5 * MB);
        assert!(!mgr.check_and_manage_storage(None));
        assert_eq!(store.segment_count(), 2);
    }

    #[test]
    fn test_disabled_policy_is_inert() {
        let store = Arc::new(MemorySegmentStore::new(2 * MB));
        store.insert_sized("/a.avi", MB as usize, at(0));
        store.insert_sized("/b.avi", MB as usize, at(1));

        let mgr = manager(store.clone(), 1, 10 * MB);
        mgr.set_eviction_enabled(false);

        assert!(mgr.check_and_manage_storage(None));
        assert_eq!(store.segment_count(), 2);
    }

    #[test]
    fn test_storage_info_snapshot() {
        let store = Arc::new(MemorySegmentStore::new(10 * MB));
        store.insert_sized("/a.avi", MB as usize, at(0));
        store.set_extra_used_bytes(MB);

        let mgr = manager(store, 10 * MB, MB);
        let info = mgr.storage_info().unwrap();
        assert_eq!(info.segment_count, 1);
        assert_eq!(info.segment_bytes, MB);
        assert_eq!(info.used_bytes, 2 * MB);
        assert_eq!(info.free_bytes, 8 * MB);
    }
}
