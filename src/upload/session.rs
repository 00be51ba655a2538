use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

use crate::upload::types::UploadStatus;

/// State of the single in-flight transfer.
///
/// Invariants: `current_path` is set iff `active`; `paused` only while
/// `active`. The watchdog bookkeeping lives here as explicit fields so each
/// pipeline instance recovers independently and tests stay deterministic.
#[derive(Debug, Default)]
pub struct UploadSession {
    active: bool,
    paused: bool,
    current_path: Option<PathBuf>,
    bytes_sent: u64,
    total_bytes: u64,
    last_attempt: Option<Instant>,
    watchdog_checked_at: Option<Instant>,
}

impl UploadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }

    /// Mark a transfer active for `path` and stamp the attempt time.
    pub fn begin(&mut self, path: PathBuf, now: Instant) {
        self.active = true;
        self.current_path = Some(path);
        self.bytes_sent = 0;
        self.total_bytes = 0;
        self.last_attempt = Some(now);
    }

    /// Reset per-attempt progress; each attempt restarts from byte zero.
    pub fn start_attempt(&mut self, total_bytes: u64) {
        self.bytes_sent = 0;
        self.total_bytes = total_bytes;
    }

    pub fn record_progress(&mut self, bytes: u64) {
        self.bytes_sent += bytes;
    }

    /// Clear all transfer state, including any pause overlay.
    pub fn finish(&mut self) {
        self.active = false;
        self.paused = false;
        self.current_path = None;
    }

    /// Request a pause. Meaningless (and ignored) while idle.
    pub fn pause(&mut self) -> bool {
        if self.active && !self.paused {
            self.paused = true;
            return true;
        }
        false
    }

    pub fn resume(&mut self) -> bool {
        if self.paused {
            self.paused = false;
            return true;
        }
        false
    }

    /// Watchdog: clear a session stuck in the active state.
    ///
    /// Rate-limited to one inspection per `check_interval`; resets only when
    /// the session has been active with no fresh attempt for over `ceiling`.
    pub fn reset_if_stuck(&mut self, now: Instant, check_interval: Duration, ceiling: Duration) -> bool {
        if let Some(checked) = self.watchdog_checked_at {
            if now.duration_since(checked) < check_interval {
                return false;
            }
        }
        self.watchdog_checked_at = Some(now);

        let stuck = self.active
            && self
                .last_attempt
                .map(|at| now.duration_since(at) > ceiling)
                .unwrap_or(false);
        if stuck {
            tracing::warn!(
                "upload session stuck on {:?}, resetting",
                self.current_path
            );
            self.finish();
            return true;
        }
        false
    }

    pub fn snapshot(&self, queued: usize) -> UploadStatus {
        UploadStatus {
            active: self.active,
            paused: self.paused,
            current_path: self.current_path.clone(),
            bytes_sent: self.bytes_sent,
            total_bytes: self.total_bytes,
            queued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECK: Duration = Duration::from_secs(30);
    const CEILING: Duration = Duration::from_secs(300);

    #[test]
    fn test_begin_sets_invariant() {
        let mut session = UploadSession::new();
        assert!(!session.is_active());
        assert!(session.current_path().is_none());

        session.begin(PathBuf::from("/a.avi"), Instant::now());
        assert!(session.is_active());
        assert_eq!(session.current_path(), Some(Path::new("/a.avi")));

        session.finish();
        assert!(!session.is_active());
        assert!(session.current_path().is_none());
    }

    #[test]
    fn test_pause_requires_active() {
        let mut session = UploadSession::new();
        assert!(!session.pause());
        assert!(!session.is_paused());

        session.begin(PathBuf::from("/a.avi"), Instant::now());
        assert!(session.pause());
        assert!(session.is_paused());
        assert!(!session.pause());

        assert!(session.resume());
        assert!(!session.is_paused());
    }

    #[test]
    fn test_finish_clears_pause() {
        let mut session = UploadSession::new();
        session.begin(PathBuf::from("/a.avi"), Instant::now());
        session.pause();
        session.finish();
        assert!(!session.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_resets_stuck_session() {
        let mut session = UploadSession::new();
        session.begin(PathBuf::from("/a.avi"), Instant::now());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(session.reset_if_stuck(Instant::now(), CHECK, CEILING));
        assert!(!session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_leaves_recent_session_alone() {
        let mut session = UploadSession::new();
        session.begin(PathBuf::from("/a.avi"), Instant::now());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(!session.reset_if_stuck(Instant::now(), CHECK, CEILING));
        assert!(session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_is_rate_limited() {
        let mut session = UploadSession::new();
        session.begin(PathBuf::from("/a.avi"), Instant::now());

        // First inspection stamps the check time, session not yet stuck.
        assert!(!session.reset_if_stuck(Instant::now(), CHECK, CEILING));

        // Past the ceiling, but within the check interval of the last look.
        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(!session.reset_if_stuck(Instant::now() - Duration::from_secs(280), CHECK, CEILING));

        // A later inspection outside the interval performs the reset.
        assert!(session.reset_if_stuck(Instant::now(), CHECK, CEILING));
    }

    #[test]
    fn test_snapshot_reflects_progress() {
        let mut session = UploadSession::new();
        session.begin(PathBuf::from("/a.avi"), Instant::now());
        session.start_attempt(1000);
        session.record_progress(250);

        let status = session.snapshot(3);
        assert!(status.active);
        assert_eq!(status.bytes_sent, 250);
        assert_eq!(status.total_bytes, 1000);
        assert_eq!(status.queued, 3);
    }
}
