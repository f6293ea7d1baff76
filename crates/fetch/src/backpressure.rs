//! Parse-queue backpressure, per spec.md §5: proportional slowdown between
//! the soft and hard limits, hard block above the hard limit.

use std::time::Duration;

use podcrawler_store::StoreClient;
use tracing::debug;

const BASE_SLEEP_SECS: f64 = 2.0;
const HARD_RECHECK_INTERVAL: Duration = Duration::from_secs(3);

/// Waits as long as the pod's parse queue (`queue_key`) demands before the
/// caller is allowed to push another job onto it.
pub async fn wait_for_capacity(store: &dyn StoreClient, queue_key: &str, soft_limit: usize, hard_limit: usize) {
    let mut len = store.queue_len(queue_key).await.unwrap_or(0) as usize;
    if len > hard_limit {
        // once over the hard limit, block until the queue has drained all
        // the way back to the soft limit, not merely back under hard_limit.
        while len > soft_limit {
            debug!(len, soft_limit, hard_limit, "parse queue over hard limit, blocking");
            tokio::time::sleep(HARD_RECHECK_INTERVAL).await;
            len = store.queue_len(queue_key).await.unwrap_or(0) as usize;
        }
        return;
    }

    if len < soft_limit || hard_limit <= soft_limit {
        return;
    }
    let overflow_ratio = ((len - soft_limit) as f64 / (hard_limit - soft_limit) as f64).clamp(0.0, 1.0);
    let jitter = rand::random::<f64>() * 0.5;
    let sleep_secs = overflow_ratio * BASE_SLEEP_SECS + jitter;
    debug!(len, soft_limit, hard_limit, sleep_secs, "applying proportional backpressure");
    tokio::time::sleep(Duration::from_secs_f64(sleep_secs)).await;
}
