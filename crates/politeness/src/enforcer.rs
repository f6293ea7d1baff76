use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use podcrawler_core::url_utils;
use podcrawler_store::StoreClient;
use tracing::warn;

use crate::robots::ParsedRobots;

const ROBOTS_TXT_MAX_BYTES: usize = 512 * 1024;

/// Per-pod politeness gate: manual exclusions, robots.txt fetch/cache, and
/// the per-domain `next_fetch_time` rate limiter (spec.md §4.4).
pub struct PolitenessEnforcer {
    store: Arc<dyn StoreClient>,
    http: reqwest::Client,
    user_agent: String,
    politeness_delay_seconds: i64,
    robots_cache_ttl_seconds: i64,
}

impl PolitenessEnforcer {
    pub fn new(
        store: Arc<dyn StoreClient>,
        user_agent: String,
        politeness_delay_seconds: u64,
        robots_cache_ttl_seconds: u64,
        http_timeout_seconds: u64,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.clone())
            .timeout(Duration::from_secs(http_timeout_seconds))
            .build()
            .expect("reqwest client builder with static config never fails");
        Self {
            store,
            http,
            user_agent,
            politeness_delay_seconds: politeness_delay_seconds as i64,
            robots_cache_ttl_seconds: robots_cache_ttl_seconds as i64,
        }
    }

    /// Loads manually excluded domains from a plain-text file (one domain
    /// per line, blank lines and `#` comments ignored) into the domain
    /// hashes. A no-op if `path` is `None`.
    pub async fn initialize(&self, path: Option<&Path>) -> anyhow::Result<()> {
        let Some(path) = path else {
            return Ok(());
        };
        let file = std::fs::File::open(path)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let domain = line.trim();
            if domain.is_empty() || domain.starts_with('#') {
                continue;
            }
            let key = format!("domain:{}", domain.to_lowercase());
            self.store
                .hash_set(&key, &[("is_excluded", "1".to_string())])
                .await
                .map_err(|e| anyhow::anyhow!("exclusion load failed for {domain}: {e}"))?;
        }
        Ok(())
    }

    pub async fn is_url_allowed(&self, url: &str) -> bool {
        let Some(domain) = url_utils::extract_domain(url) else {
            return false;
        };
        let key = format!("domain:{domain}");
        match self.store.hash_get(&key, "is_excluded").await {
            Ok(Some(flag)) if flag == "1" => return false,
            Ok(_) => {}
            Err(e) => {
                warn!(domain, error = %e, "politeness store lookup failed, allowing by default");
                return true;
            }
        }

        let robots = self.load_or_fetch_robots(&domain).await;
        let path = url_utils::path_for_robots(url);
        robots.is_allowed(&path, &self.user_agent)
    }

    pub async fn can_fetch_domain_now(&self, domain: &str) -> bool {
        let key = format!("domain:{domain}");
        match self.store.hash_get(&key, "next_fetch_time").await {
            Ok(Some(raw)) => raw
                .parse::<i64>()
                .map(|next| Utc::now().timestamp() >= next)
                .unwrap_or(true),
            Ok(None) => true,
            Err(e) => {
                warn!(domain, error = %e, "politeness store lookup failed, allowing fetch");
                true
            }
        }
    }

    pub async fn record_domain_fetch_attempt(&self, domain: &str) {
        let key = format!("domain:{domain}");
        let next = Utc::now().timestamp() + self.politeness_delay_seconds;
        if let Err(e) = self
            .store
            .hash_set(&key, &[("next_fetch_time", next.to_string())])
            .await
        {
            warn!(domain, error = %e, "failed to record fetch attempt");
        }
    }

    /// Bulk-warms the robots.txt cache for a batch of domains, used at
    /// startup before the ready queue starts cycling.
    pub async fn batch_load_robots_txt(&self, domains: &[String]) {
        for domain in domains {
            self.load_or_fetch_robots(domain).await;
        }
    }

    async fn load_or_fetch_robots(&self, domain: &str) -> ParsedRobots {
        let key = format!("domain:{domain}");
        let cached_expiry = self
            .store
            .hash_get(&key, "robots_expires")
            .await
            .ok()
            .flatten()
            .and_then(|v| v.parse::<i64>().ok());

        if let Some(expires) = cached_expiry {
            if Utc::now().timestamp() < expires {
                if let Ok(Some(body)) = self.store.hash_get(&key, "robots_txt").await {
                    return ParsedRobots::from_body(body);
                }
                return ParsedRobots::allow_all();
            }
        }

        let robots = self.fetch_robots(domain).await;
        let expires = Utc::now().timestamp() + self.robots_cache_ttl_seconds;
        let body = match &robots {
            RobotsFetchOutcome::Fetched(body) => body.clone(),
            RobotsFetchOutcome::Failed => String::new(),
        };
        if let Err(e) = self
            .store
            .hash_set(
                &key,
                &[
                    ("robots_txt", body.clone()),
                    ("robots_expires", expires.to_string()),
                ],
            )
            .await
        {
            warn!(domain, error = %e, "failed to cache robots.txt");
        }

        match robots {
            RobotsFetchOutcome::Fetched(body) => ParsedRobots::from_body(body),
            RobotsFetchOutcome::Failed => ParsedRobots::allow_all(),
        }
    }

    async fn fetch_robots(&self, domain: &str) -> RobotsFetchOutcome {
        let url = format!("https://{domain}/robots.txt");
        match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => {
                    let truncated = &bytes[..bytes.len().min(ROBOTS_TXT_MAX_BYTES)];
                    RobotsFetchOutcome::Fetched(String::from_utf8_lossy(truncated).into_owned())
                }
                Err(e) => {
                    warn!(domain, error = %e, "robots.txt body read failed");
                    RobotsFetchOutcome::Failed
                }
            },
            Ok(resp) => {
                warn!(domain, status = %resp.status(), "robots.txt fetch non-success, defaulting permissive");
                RobotsFetchOutcome::Failed
            }
            Err(e) => {
                warn!(domain, error = %e, "robots.txt fetch failed, defaulting permissive");
                RobotsFetchOutcome::Failed
            }
        }
    }
}

enum RobotsFetchOutcome {
    Fetched(String),
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcrawler_store::MemoryStoreClient;
    use std::io::Write;

    fn enforcer() -> PolitenessEnforcer {
        let store: Arc<dyn StoreClient> = Arc::new(MemoryStoreClient::new());
        PolitenessEnforcer::new(store, "podcrawler-test/1.0".to_string(), 70, 86_400, 5)
    }

    #[tokio::test]
    async fn can_fetch_domain_now_defaults_true_for_unknown_domain() {
        let enforcer = enforcer();
        assert!(enforcer.can_fetch_domain_now("unseen.test").await);
    }

    #[tokio::test]
    async fn record_fetch_attempt_blocks_immediate_refetch() {
        let enforcer = enforcer();
        enforcer.record_domain_fetch_attempt("a.test").await;
        assert!(!enforcer.can_fetch_domain_now("a.test").await);
    }

    #[tokio::test]
    async fn exclusions_file_blocks_url() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "excluded.test").unwrap();
        writeln!(file, "# a comment").unwrap();

        let enforcer = enforcer();
        enforcer.initialize(Some(file.path())).await.unwrap();
        assert!(!enforcer.is_url_allowed("https://excluded.test/page").await);
    }

    #[tokio::test]
    async fn unexcluded_domain_with_unreachable_robots_is_permissive() {
        let enforcer = enforcer();
        // example.invalid never resolves; fetch_robots fails and the
        // permissive fallback applies.
        assert!(
            enforcer
                .is_url_allowed("https://example.invalid/page")
                .await
        );
    }
}
