use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use cliprelay::retention::{RetentionManager, RetentionPolicy};
use cliprelay::store::FsSegmentStore;
use cliprelay::transport::{AlwaysOnline, TcpConnector};
use cliprelay::upload::{UploadConfig, UploadOutcome, UploadPipeline};

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cliprelay=info".parse().unwrap()),
        )
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    cliprelay::metrics::init_metrics();

    let segment_dir = std::env::var("CLIPRELAY_SEGMENT_DIR").unwrap_or_else(|_| "segments".into());
    let endpoint = std::env::var("CLIPRELAY_ENDPOINT")
        .context("CLIPRELAY_ENDPOINT must point at the collector upload URL")?;

    let capacity = env_u64("CLIPRELAY_CAPACITY_BYTES", 64 * 1024 * 1024);
    let policy = RetentionPolicy {
        max_reserved_bytes: env_u64("CLIPRELAY_MAX_RESERVED_BYTES", 24 * 1024 * 1024),
        min_free_bytes: env_u64("CLIPRELAY_MIN_FREE_BYTES", 1024 * 1024),
        eviction_enabled: true,
    };
    let cycle = Duration::from_secs(env_u64("CLIPRELAY_CYCLE_SECS", 10));

    let store = Arc::new(
        FsSegmentStore::new(&segment_dir, capacity)
            .with_context(|| format!("failed to open segment store at {segment_dir}"))?,
    );
    let retention = RetentionManager::new(Arc::clone(&store), policy);

    let config = UploadConfig {
        endpoint_url: endpoint.clone(),
        auth_token: std::env::var("CLIPRELAY_AUTH_TOKEN").ok(),
        use_tls: endpoint.starts_with("https://"),
        ..UploadConfig::default()
    };
    let pipeline = UploadPipeline::new(
        Arc::clone(&store),
        TcpConnector::new(),
        AlwaysOnline,
        config,
    );
    let queue = pipeline.queue_handle();

    tracing::info!(
        "cliprelay started: store={} capacity={}MB endpoint={}",
        segment_dir,
        capacity / 1024 / 1024,
        endpoint
    );

    let mut ticker = tokio::time::interval(cycle);
    loop {
        ticker.tick().await;

        // The recorder writes files behind our back; re-read the directory.
        store.invalidate();
        if let Err(e) = pipeline.rescan_store() {
            tracing::warn!("store rescan failed: {}", e);
        }

        if !retention.check_and_manage_storage(Some(&queue)) {
            tracing::warn!("free space still below minimum after cleanup");
        }
        match retention.storage_info() {
            Ok(info) => tracing::info!("{}", info),
            Err(e) => tracing::warn!("storage info unavailable: {}", e),
        }

        match pipeline.process_queue().await {
            Some(UploadOutcome::Uploaded { path }) => {
                tracing::info!("uploaded {}", path.display());
            }
            Some(UploadOutcome::Abandoned { path, attempts }) => {
                tracing::warn!("gave up on {} after {} attempts", path.display(), attempts);
            }
            None => {}
        }

        pipeline.reset_stuck_upload_state();

        if let Ok(status) = serde_json::to_string(&pipeline.status()) {
            tracing::debug!("upload status: {}", status);
        }
    }
}
