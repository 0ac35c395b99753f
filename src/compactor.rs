use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::store::Store;

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites the WAL once enough appends have piled up
/// since the last compaction.
pub async fn run_compactor(store: Arc<Store>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&store, threshold).await {
            warn!("WAL compaction failed: {e}");
        }
    }
}

/// Compact when at least `threshold` appends happened since the last
/// rewrite. Returns whether it compacted.
pub async fn compact_if_due(
    store: &Store,
    threshold: u64,
) -> Result<bool, crate::store::StoreError> {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        debug!("compactor: {appends}/{threshold} appends, skipping");
        return Ok(false);
    }
    store.compact_wal().await?;
    info!("compactor: rewrote WAL after {appends} appends");
    Ok(true)
}
