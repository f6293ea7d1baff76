//! Production [`StoreClient`] backed by a pooled Redis connection. Bloom
//! operations use the RedisBloom module's `BF.*` commands directly since
//! `redis-rs` has no native bloom support.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;

use crate::client::{StoreClient, StoreError, StoreResult};

pub struct RedisStoreClient {
    pool: Pool<RedisConnectionManager>,
}

impl RedisStoreClient {
    /// Builds a connection pool against `url` (e.g.
    /// `redis://host:6379/0`) with a modest pool size; a pod's store
    /// client is shared across a whole worker pool so the pool itself
    /// provides the concurrency, not a per-call connection.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let manager = RedisConnectionManager::new(url)
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let pool = Pool::builder()
            .max_size(16)
            .build(manager)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn conn(
        &self,
    ) -> StoreResult<bb8::PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl StoreClient for RedisStoreClient {
    async fn list_lpush(&self, key: &str, values: &[String]) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        conn.lpush(key, values)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn list_rpush(&self, key: &str, values: &[String]) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        conn.rpush(key, values)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn list_rpop(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.rpop(key, None)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn list_lpop(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.lpop(key, None)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        conn.llen(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let owned: Vec<(&str, &str)> = fields.iter().map(|(f, v)| (*f, v.as_str())).collect();
        conn.hset_multiple(key, &owned)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn hash_set_nx(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.hset_nx(key, field, value)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.hget(key, field)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        conn.hgetall(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn bloom_ensure(&self, key: &str, capacity: u64, error_rate: f64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let result: redis::RedisResult<()> = redis::cmd("BF.RESERVE")
            .arg(key)
            .arg(error_rate)
            .arg(capacity)
            .query_async(&mut *conn)
            .await;
        match result {
            Ok(()) => Ok(()),
            // ERR item exists: the filter is already there, which is the
            // desired end state for an "ensure" call.
            Err(e) if e.to_string().contains("item exists") => Ok(()),
            Err(e) => Err(StoreError::Command(e.to_string())),
        }
    }

    async fn bloom_reset(&self, key: &str, capacity: u64, error_rate: f64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        redis::cmd("BF.RESERVE")
            .arg(key)
            .arg(error_rate)
            .arg(capacity)
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn bloom_add_multi(&self, key: &str, items: &[String]) -> StoreResult<Vec<bool>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("BF.MADD");
        cmd.arg(key);
        for item in items {
            cmd.arg(item);
        }
        let raw: Vec<i64> = cmd
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        Ok(raw.into_iter().map(|v| v != 0).collect())
    }

    async fn bloom_exists_multi(&self, key: &str, items: &[String]) -> StoreResult<Vec<bool>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("BF.MEXISTS");
        cmd.arg(key);
        for item in items {
            cmd.arg(item);
        }
        let raw: Vec<i64> = cmd
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        Ok(raw.into_iter().map(|v| v != 0).collect())
    }

    async fn counter_incr(&self, key: &str, amount: i64) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        conn.incr(key, amount)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn get_str(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn().await?;
        conn.get(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn set_str(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        conn.set(key, value)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.exists(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        conn.del(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn clear_frontier_state(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        for pattern in ["frontier:*", "domain:*"] {
            let keys: Vec<String> = conn
                .keys(pattern)
                .await
                .map_err(|e| StoreError::Command(e.to_string()))?;
            if !keys.is_empty() {
                conn.del(&keys)
                    .await
                    .map_err(|e| StoreError::Command(e.to_string()))?;
            }
        }
        conn.del("domains:queue")
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn queue_push_bytes(&self, key: &str, value: Vec<u8>) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        conn.lpush(key, value)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }

    async fn queue_blocking_pop_bytes(
        &self,
        key: &str,
        timeout: Duration,
    ) -> StoreResult<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let result: Option<(String, Vec<u8>)> = conn
            .brpop(key, timeout.as_secs_f64())
            .await
            .map_err(|e| StoreError::Command(e.to_string()))?;
        Ok(result.map(|(_, payload)| payload))
    }

    async fn queue_len(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn().await?;
        conn.llen(key)
            .await
            .map_err(|e| StoreError::Command(e.to_string()))
    }
}
