use serde::Deserialize;

/// Top-level YAML configuration, per spec.md §6.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub pods: Vec<PodConfig>,
    pub data_dirs: Vec<String>,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_fetchers_per_pod")]
    pub fetchers_per_pod: usize,
    #[serde(default = "default_parsers_per_pod")]
    pub parsers_per_pod: usize,
    #[serde(default = "default_fetcher_workers")]
    pub fetcher_workers: usize,
    #[serde(default = "default_parser_workers")]
    pub parser_workers: usize,

    #[serde(default)]
    pub enable_cpu_affinity: bool,
    #[serde(default = "default_cores_per_pod")]
    pub cores_per_pod: usize,

    #[serde(default = "default_politeness_delay_seconds")]
    pub politeness_delay_seconds: u64,
    #[serde(default = "default_robots_cache_ttl_seconds")]
    pub robots_cache_ttl_seconds: u64,

    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    #[serde(default = "default_http_max_retries")]
    pub http_max_retries: u32,
    #[serde(default = "default_max_body_size_bytes")]
    pub max_body_size_bytes: usize,

    #[serde(default = "default_bloom_filter_capacity")]
    pub bloom_filter_capacity: u64,
    #[serde(default = "default_bloom_filter_error_rate")]
    pub bloom_filter_error_rate: f64,

    #[serde(default = "default_parse_queue_soft_limit")]
    pub parse_queue_soft_limit: usize,
    #[serde(default = "default_parse_queue_hard_limit")]
    pub parse_queue_hard_limit: usize,

    pub user_agent_template: String,

    #[serde(default)]
    pub seeded_urls_only: bool,
    #[serde(default)]
    pub resume: bool,
    #[serde(default)]
    pub max_pages: Option<u64>,
    #[serde(default)]
    pub max_duration: Option<u64>,

    #[serde(default)]
    pub global_coordination_redis_pod: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PodConfig {
    pub store_url: String,
}

impl AppConfig {
    pub fn pod_count(&self) -> usize {
        self.pods.len()
    }

    /// Renders the user agent string by substituting `{email}`, per
    /// spec.md §6. Returns an error if the template lacks the placeholder —
    /// caught at init time, surfaced as a fatal config error (§7).
    pub fn user_agent(&self, email: &str) -> Result<String, String> {
        if !self.user_agent_template.contains("{email}") {
            return Err("user_agent_template must contain {email}".to_string());
        }
        Ok(self.user_agent_template.replace("{email}", email))
    }
}

fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_fetchers_per_pod() -> usize {
    1
}
fn default_parsers_per_pod() -> usize {
    1
}
fn default_fetcher_workers() -> usize {
    100
}
fn default_parser_workers() -> usize {
    20
}
fn default_cores_per_pod() -> usize {
    1
}
fn default_politeness_delay_seconds() -> u64 {
    70
}
fn default_robots_cache_ttl_seconds() -> u64 {
    86_400
}
fn default_http_timeout_seconds() -> u64 {
    30
}
fn default_http_max_retries() -> u32 {
    3
}
fn default_max_body_size_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_bloom_filter_capacity() -> u64 {
    10_000_000
}
fn default_bloom_filter_error_rate() -> f64 {
    0.001
}
fn default_parse_queue_soft_limit() -> usize {
    20_000
}
fn default_parse_queue_hard_limit() -> usize {
    80_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
pods:
  - store_url: "redis://pod0:6379"
  - store_url: "redis://pod1:6379"
data_dirs:
  - "/mnt/ssd0"
user_agent_template: "podcrawler/1.0 (+mailto:{email})"
"#
    }

    #[test]
    fn defaults_fill_in_when_absent() {
        let cfg: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        assert_eq!(cfg.pod_count(), 2);
        assert_eq!(cfg.politeness_delay_seconds, 70);
        assert_eq!(cfg.robots_cache_ttl_seconds, 86_400);
        assert_eq!(cfg.parse_queue_soft_limit, 20_000);
        assert_eq!(cfg.parse_queue_hard_limit, 80_000);
        assert_eq!(cfg.max_body_size_bytes, 10 * 1024 * 1024);
        assert!(!cfg.resume);
        assert!(cfg.max_pages.is_none());
    }

    #[test]
    fn user_agent_substitutes_email() {
        let cfg: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        let ua = cfg.user_agent("ops@example.com").unwrap();
        assert_eq!(ua, "podcrawler/1.0 (+mailto:ops@example.com)");
    }

    #[test]
    fn user_agent_rejects_missing_placeholder() {
        let mut cfg: AppConfig = serde_yaml::from_str(minimal_yaml()).unwrap();
        cfg.user_agent_template = "podcrawler/1.0".to_string();
        assert!(cfg.user_agent("ops@example.com").is_err());
    }

    #[test]
    fn overrides_take_effect() {
        let yaml = format!(
            "{}\npoliteness_delay_seconds: 5\nresume: true\nmax_pages: 100\n",
            minimal_yaml()
        );
        let cfg: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(cfg.politeness_delay_seconds, 5);
        assert!(cfg.resume);
        assert_eq!(cfg.max_pages, Some(100));
    }
}
