use std::time::Duration;
use tokio::time::Instant;

/// Recording-subsystem timing, consumed only for pause/resume decisions.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTiming {
    pub last_capture_start: Instant,
    pub capture_duration: Duration,
    pub capture_interval: Duration,
}

impl CaptureTiming {
    /// Time remaining until the next scheduled capture begins.
    pub fn time_until_next_capture(&self, now: Instant) -> Duration {
        self.capture_interval
            .saturating_sub(now.duration_since(self.last_capture_start))
    }

    /// Whether a capture is currently in progress.
    pub fn in_capture_window(&self, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_capture_start);
        elapsed < self.capture_duration && elapsed < self.capture_interval
    }
}
