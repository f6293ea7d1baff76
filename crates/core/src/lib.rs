pub mod config;
pub mod error;
pub mod hash;
pub mod pod;
pub mod types;
pub mod url_utils;

pub use config::AppConfig;
pub use error::CrawlError;
pub use pod::pod_for_domain;
pub use types::*;
