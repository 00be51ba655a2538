use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Link-status query, independent of any single connection attempt.
pub trait LinkMonitor {
    fn is_network_available(&self) -> bool;
}

/// Link monitor for deployments where connectivity is assumed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl LinkMonitor for AlwaysOnline {
    fn is_network_available(&self) -> bool {
        true
    }
}

/// Shared flag a platform integration flips as the interface goes up or down.
#[derive(Debug, Clone)]
pub struct SharedLink {
    up: Arc<AtomicBool>,
}

impl SharedLink {
    pub fn new(initially_up: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(initially_up)),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

impl Default for SharedLink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl LinkMonitor for SharedLink {
    fn is_network_available(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}
