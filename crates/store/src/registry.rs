//! Lazily builds and caches one [`StoreClient`] per pod, keyed by pod
//! index. A pod's `store_url` (spec.md §6) selects the backend: a
//! `redis://` URL connects [`RedisStoreClient`](crate::redis_client::RedisStoreClient),
//! anything else (notably `memory://`) falls back to the in-process
//! [`MemoryStoreClient`](crate::memory_client::MemoryStoreClient) so tests
//! and single-process deployments never need a real Redis.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use podcrawler_core::config::PodConfig;

use crate::client::{StoreClient, StoreResult};
use crate::memory_client::MemoryStoreClient;
use crate::redis_client::RedisStoreClient;

pub struct PodStoreRegistry {
    pods: Vec<PodConfig>,
    clients: Mutex<HashMap<usize, Arc<dyn StoreClient>>>,
}

impl PodStoreRegistry {
    pub fn new(pods: Vec<PodConfig>) -> Self {
        Self {
            pods,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    /// Returns the cached client for `pod_id`, connecting it on first use.
    pub async fn client_for_pod(&self, pod_id: usize) -> StoreResult<Arc<dyn StoreClient>> {
        {
            let guard = self.clients.lock().await;
            if let Some(client) = guard.get(&pod_id) {
                return Ok(client.clone());
            }
        }
        let pod = self
            .pods
            .get(pod_id)
            .unwrap_or_else(|| panic!("pod_id {pod_id} out of range ({} pods configured)", self.pods.len()));
        let client: Arc<dyn StoreClient> = if pod.store_url.starts_with("redis://") {
            info!(pod_id, store_url = %pod.store_url, "connecting pod store (redis)");
            Arc::new(RedisStoreClient::connect(&pod.store_url).await?)
        } else {
            info!(pod_id, store_url = %pod.store_url, "using in-memory pod store");
            Arc::new(MemoryStoreClient::new())
        };
        let mut guard = self.clients.lock().await;
        let client = guard.entry(pod_id).or_insert(client).clone();
        Ok(client)
    }
}
