pub mod backpressure;
pub mod pool;

pub use pool::{FetcherConfig, FetcherWorkerPool};
