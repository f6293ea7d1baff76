use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),
    #[error("store command error: {0}")]
    Command(String),
}

/// The pod-local store contract: a remote key/value + list + hash +
/// bloom-filter service, treated as a black box per spec.md §1. Every
/// operation maps onto a single store-native command or a pipelined batch
/// of them — there is no multi-key transaction requirement (spec.md §5).
///
/// Two concrete flavors exist: [`crate::redis_client::RedisStoreClient`]
/// speaks to a real Redis-compatible store (using `BF.*` commands from the
/// RedisBloom module for the bloom operations), and
/// [`crate::memory_client::MemoryStoreClient`] is the in-process stand-in
/// spec.md's design notes explicitly permit.
#[async_trait]
pub trait StoreClient: Send + Sync {
    // -- lists: frontier:{domain}, domains:queue, fetch:queue (text flavor) --

    /// Prepend `values` to the head of `key` in the given order (so the
    /// first element of `values` ends up closest to the head after all are
    /// pushed) — used for frontier adds (LPUSH semantics).
    async fn list_lpush(&self, key: &str, values: &[String]) -> StoreResult<u64>;

    /// Append `values` to the tail of `key` — used for ready-queue rotation
    /// (RPUSH semantics).
    async fn list_rpush(&self, key: &str, values: &[String]) -> StoreResult<u64>;

    /// Pop one element from the tail of `key` (RPOP) — frontier consumption.
    async fn list_rpop(&self, key: &str) -> StoreResult<Option<String>>;

    /// Pop one element from the head of `key` (LPOP) — ready-queue rotation.
    async fn list_lpop(&self, key: &str) -> StoreResult<Option<String>>;

    async fn list_len(&self, key: &str) -> StoreResult<u64>;

    // -- hashes: domain:{domain}, visited:{...}, pod:info --

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()>;

    /// Sets `field` only if it doesn't already exist. Returns `true` if the
    /// field was set (didn't previously exist).
    async fn hash_set_nx(&self, key: &str, field: &str, value: &str) -> StoreResult<bool>;

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    // -- bloom: seen:bloom --

    /// Ensures the bloom filter at `key` exists with the given capacity/FPR.
    /// A no-op if it already exists.
    async fn bloom_ensure(&self, key: &str, capacity: u64, error_rate: f64) -> StoreResult<()>;

    /// Deletes and recreates the bloom filter at `key` (fresh-run path).
    async fn bloom_reset(&self, key: &str, capacity: u64, error_rate: f64) -> StoreResult<()>;

    /// Adds `items` to the bloom filter, returning per-item "was newly
    /// added" flags (mirrors RedisBloom's `BF.MADD`).
    async fn bloom_add_multi(&self, key: &str, items: &[String]) -> StoreResult<Vec<bool>>;

    /// Tests membership of `items`, returning per-item "probably present"
    /// flags (mirrors `BF.MEXISTS`).
    async fn bloom_exists_multi(&self, key: &str, items: &[String]) -> StoreResult<Vec<bool>>;

    // -- counters & scalars: stats:urls_added, schema_version --

    async fn counter_incr(&self, key: &str, amount: i64) -> StoreResult<i64>;

    async fn get_str(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_str(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn exists(&self, key: &str) -> StoreResult<bool>;

    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Deletes every `frontier:*` list, every `domain:*` hash, and the
    /// `domains:queue` list — the reset path taken when `resume=false`
    /// (spec.md §4.3 init step 4). Does not touch `seen:bloom`,
    /// `stats:urls_added`, or `pod:info` (spec.md §9: those survive for
    /// post-mortem inspection even though this particular reset discards
    /// the bloom filter separately via `bloom_reset`).
    async fn clear_frontier_state(&self) -> StoreResult<()>;

    // -- fetch:queue (binary flavor: opaque bincode ParseJob payloads) --

    async fn queue_push_bytes(&self, key: &str, value: Vec<u8>) -> StoreResult<()>;

    /// Blocking pop with a timeout, mirroring `BRPOP`. Returns `None` on
    /// timeout rather than erroring.
    async fn queue_blocking_pop_bytes(
        &self,
        key: &str,
        timeout: Duration,
    ) -> StoreResult<Option<Vec<u8>>>;

    async fn queue_len(&self, key: &str) -> StoreResult<u64>;
}
