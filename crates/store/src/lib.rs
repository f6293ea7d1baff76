pub mod client;
pub mod memory_client;
pub mod redis_client;
pub mod registry;

pub use client::{StoreClient, StoreError, StoreResult};
pub use memory_client::MemoryStoreClient;
pub use redis_client::RedisStoreClient;
pub use registry::PodStoreRegistry;
