//! Metric registration for retention and upload instrumentation.

use metrics::{describe_counter, describe_gauge};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Register metric descriptions (call once at startup).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    describe_counter!(
        "cliprelay_uploads_completed_total",
        "Segments uploaded successfully"
    );
    describe_counter!(
        "cliprelay_uploads_abandoned_total",
        "Segments dropped after exhausting their retry budget"
    );
    describe_counter!(
        "cliprelay_upload_retries_total",
        "Retry attempts across all segments"
    );
    describe_counter!("cliprelay_bytes_uploaded_total", "Segment body bytes sent");

    describe_counter!(
        "cliprelay_segments_evicted_total",
        "Segments deleted by the retention policy"
    );
    describe_counter!(
        "cliprelay_bytes_evicted_total",
        "Bytes reclaimed by the retention policy"
    );

    describe_gauge!(
        "cliprelay_upload_queue_depth",
        "Segments currently awaiting upload"
    );
}
