//! The in-process store alternative spec.md's design notes explicitly
//! permit: preserves the same atomic list pop/push and hash-field update
//! semantics as the Redis-backed client, without needing a real store
//! running. Used by the test suites across this workspace and available to
//! any deployment that wants a single-process pod with no external
//! dependency.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use growable_bloom_filter::GrowableBloom;
use tokio::sync::Mutex;

use crate::client::{StoreClient, StoreError, StoreResult};

struct BloomState {
    filter: GrowableBloom,
}

pub struct MemoryStoreClient {
    lists: DashMap<String, Mutex<VecDeque<String>>>,
    hashes: DashMap<String, Mutex<HashMap<String, String>>>,
    blooms: DashMap<String, Mutex<BloomState>>,
    scalars: DashMap<String, String>,
    byte_queues: DashMap<String, Mutex<VecDeque<Vec<u8>>>>,
}

impl Default for MemoryStoreClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreClient {
    pub fn new() -> Self {
        Self {
            lists: DashMap::new(),
            hashes: DashMap::new(),
            blooms: DashMap::new(),
            scalars: DashMap::new(),
            byte_queues: DashMap::new(),
        }
    }

    fn list_handle(&self, key: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<VecDeque<String>>> {
        self.lists
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        self.lists.get(key).expect("just inserted")
    }

    fn hash_handle(&self, key: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<HashMap<String, String>>> {
        self.hashes
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(HashMap::new()));
        self.hashes.get(key).expect("just inserted")
    }

    fn byte_queue_handle(&self, key: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<VecDeque<Vec<u8>>>> {
        self.byte_queues
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        self.byte_queues.get(key).expect("just inserted")
    }
}

#[async_trait]
impl StoreClient for MemoryStoreClient {
    async fn list_lpush(&self, key: &str, values: &[String]) -> StoreResult<u64> {
        let handle = self.list_handle(key);
        let mut list = handle.lock().await;
        for v in values {
            list.push_front(v.clone());
        }
        Ok(list.len() as u64)
    }

    async fn list_rpush(&self, key: &str, values: &[String]) -> StoreResult<u64> {
        let handle = self.list_handle(key);
        let mut list = handle.lock().await;
        for v in values {
            list.push_back(v.clone());
        }
        Ok(list.len() as u64)
    }

    async fn list_rpop(&self, key: &str) -> StoreResult<Option<String>> {
        let handle = self.list_handle(key);
        let mut list = handle.lock().await;
        Ok(list.pop_back())
    }

    async fn list_lpop(&self, key: &str) -> StoreResult<Option<String>> {
        let handle = self.list_handle(key);
        let mut list = handle.lock().await;
        Ok(list.pop_front())
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let handle = self.list_handle(key);
        let list = handle.lock().await;
        Ok(list.len() as u64)
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        let handle = self.hash_handle(key);
        let mut map = handle.lock().await;
        for (field, value) in fields {
            map.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn hash_set_nx(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let handle = self.hash_handle(key);
        let mut map = handle.lock().await;
        if map.contains_key(field) {
            Ok(false)
        } else {
            map.insert(field.to_string(), value.to_string());
            Ok(true)
        }
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let handle = self.hash_handle(key);
        let map = handle.lock().await;
        Ok(map.get(field).cloned())
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let handle = self.hash_handle(key);
        let map = handle.lock().await;
        Ok(map.clone())
    }

    async fn bloom_ensure(&self, key: &str, capacity: u64, error_rate: f64) -> StoreResult<()> {
        if !self.blooms.contains_key(key) {
            self.blooms.insert(
                key.to_string(),
                Mutex::new(BloomState {
                    filter: GrowableBloom::new(error_rate, capacity as usize),
                }),
            );
        }
        Ok(())
    }

    async fn bloom_reset(&self, key: &str, capacity: u64, error_rate: f64) -> StoreResult<()> {
        self.blooms.insert(
            key.to_string(),
            Mutex::new(BloomState {
                filter: GrowableBloom::new(error_rate, capacity as usize),
            }),
        );
        Ok(())
    }

    async fn bloom_add_multi(&self, key: &str, items: &[String]) -> StoreResult<Vec<bool>> {
        self.bloom_ensure(key, 100_000, 0.001).await?;
        let handle = self
            .blooms
            .get(key)
            .ok_or_else(|| StoreError::Command("bloom key missing".to_string()))?;
        let mut state = handle.lock().await;
        Ok(items.iter().map(|i| state.filter.insert(i)).collect())
    }

    async fn bloom_exists_multi(&self, key: &str, items: &[String]) -> StoreResult<Vec<bool>> {
        self.bloom_ensure(key, 100_000, 0.001).await?;
        let handle = self
            .blooms
            .get(key)
            .ok_or_else(|| StoreError::Command("bloom key missing".to_string()))?;
        let state = handle.lock().await;
        Ok(items.iter().map(|i| state.filter.contains(i)).collect())
    }

    async fn counter_incr(&self, key: &str, amount: i64) -> StoreResult<i64> {
        let current: i64 = self
            .scalars
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let next = current + amount;
        self.scalars.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn get_str(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.scalars.get(key).map(|v| v.clone()))
    }

    async fn set_str(&self, key: &str, value: &str) -> StoreResult<()> {
        self.scalars.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.lists.contains_key(key)
            || self.hashes.contains_key(key)
            || self.scalars.contains_key(key)
            || self.blooms.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.lists.remove(key);
        self.hashes.remove(key);
        self.scalars.remove(key);
        self.blooms.remove(key);
        Ok(())
    }

    async fn clear_frontier_state(&self) -> StoreResult<()> {
        self.lists.retain(|k, _| !k.starts_with("frontier:") && k != "domains:queue");
        self.hashes.retain(|k, _| !k.starts_with("domain:"));
        Ok(())
    }

    async fn queue_push_bytes(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let handle = self.byte_queue_handle(key);
        let mut q = handle.lock().await;
        q.push_front(value);
        Ok(())
    }

    async fn queue_blocking_pop_bytes(
        &self,
        key: &str,
        timeout: Duration,
    ) -> StoreResult<Option<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let handle = self.byte_queue_handle(key);
                let mut q = handle.lock().await;
                if let Some(v) = q.pop_back() {
                    return Ok(Some(v));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(20).min(timeout)).await;
        }
    }

    async fn queue_len(&self, key: &str) -> StoreResult<u64> {
        let handle = self.byte_queue_handle(key);
        let q = handle.lock().await;
        Ok(q.len() as u64)
    }
}
