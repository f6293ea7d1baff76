use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use podcrawler_core::error::CrawlError;
use podcrawler_core::hash::visited_key_prefix;
use podcrawler_core::ParseJob;
use podcrawler_frontier::FrontierManager;
use podcrawler_store::StoreClient;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::backpressure::wait_for_capacity;

const FETCH_QUEUE_KEY: &str = "fetch:queue";
const IDLE_RETRY_INTERVAL: Duration = Duration::from_millis(500);
const STARTUP_BATCH_SIZE: usize = 10;
const STARTUP_BATCH_DELAY: Duration = Duration::from_millis(200);

pub struct FetcherConfig {
    pub http_timeout_seconds: u64,
    pub http_max_retries: u32,
    pub parse_queue_soft_limit: usize,
    pub parse_queue_hard_limit: usize,
    pub max_body_size_bytes: usize,
    pub user_agent: String,
}

/// A pod's fetcher worker pool (spec.md §4.5). Each worker repeatedly asks
/// the frontier for the next URL, fetches it, and publishes a [`ParseJob`]
/// onto the pod's own `fetch:queue`.
pub struct FetcherWorkerPool {
    store: Arc<dyn StoreClient>,
    frontier: Arc<FrontierManager>,
    http: reqwest::Client,
    config: FetcherConfig,
}

impl FetcherWorkerPool {
    pub fn new(store: Arc<dyn StoreClient>, frontier: Arc<FrontierManager>, config: FetcherConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .expect("reqwest client builder with static config never fails");
        Self {
            store,
            frontier,
            http,
            config,
        }
    }

    /// Spawns `worker_count` workers, staggered in small batches to avoid a
    /// synchronized request storm at startup (spec.md §4.5).
    pub async fn run(self: Arc<Self>, worker_count: usize, mut shutdown: watch::Receiver<bool>) {
        let mut handles = Vec::with_capacity(worker_count);
        for batch_start in (0..worker_count).step_by(STARTUP_BATCH_SIZE) {
            let batch_end = (batch_start + STARTUP_BATCH_SIZE).min(worker_count);
            for worker_id in batch_start..batch_end {
                let pool = self.clone();
                let mut worker_shutdown = shutdown.clone();
                let jitter_ms = rand::random::<u64>() % 250;
                handles.push(tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                    pool.worker_loop(worker_id, &mut worker_shutdown).await;
                }));
            }
            if batch_end < worker_count {
                tokio::time::sleep(STARTUP_BATCH_DELAY).await;
            }
        }
        let _ = shutdown.changed().await;
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn worker_loop(&self, worker_id: usize, shutdown: &mut watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            let Some(next) = self.frontier.get_next_url().await else {
                tokio::time::sleep(IDLE_RETRY_INTERVAL).await;
                continue;
            };

            self.fetch_one(worker_id, &next.url, &next.domain, next.depth).await;
            tokio::task::yield_now().await;
        }
    }

    async fn fetch_one(&self, worker_id: usize, url: &str, domain: &str, depth: u32) {
        let outcome = self.fetch_with_retries(url).await;
        match outcome {
            Ok(FetchedPage {
                final_url,
                status,
                content_type,
                body,
            }) => {
                let is_html = content_type
                    .as_deref()
                    .map(|ct| ct.contains("text/html"))
                    .unwrap_or(false);

                if status.is_success() && is_html {
                    self.publish_parse_job(&final_url, domain, depth, body, content_type, status.as_u16())
                        .await;
                } else {
                    self.record_visited(&final_url, status.as_u16(), content_type, None)
                        .await;
                }
            }
            Err(e) => {
                warn!(worker_id, url, error = %e, "fetch failed after retries");
                self.record_visited(url, 0, None, None).await;
            }
        }
    }

    async fn fetch_with_retries(&self, url: &str) -> anyhow::Result<FetchedPage> {
        let mut attempt = 0;
        loop {
            match self.http.get(url).send().await {
                Ok(resp) => {
                    let final_url = resp.url().to_string();
                    let status = resp.status();
                    let content_type = resp
                        .headers()
                        .get(reqwest::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string());
                    let body = resp.bytes().await.unwrap_or_default().to_vec();
                    if body.len() > self.config.max_body_size_bytes {
                        return Err(CrawlError::BodyTooLarge {
                            size: body.len(),
                            max: self.config.max_body_size_bytes,
                        }
                        .into());
                    }
                    return Ok(FetchedPage {
                        final_url,
                        status,
                        content_type,
                        body,
                    });
                }
                Err(e) => {
                    attempt += 1;
                    let transient = e.is_timeout() || e.is_connect();
                    if attempt > self.config.http_max_retries || !transient {
                        return Err(anyhow::anyhow!(e));
                    }
                    debug!(url, attempt, "transient fetch error, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
                }
            }
        }
    }

    async fn publish_parse_job(
        &self,
        url: &str,
        domain: &str,
        depth: u32,
        html_bytes: Vec<u8>,
        content_type: Option<String>,
        status_code: u16,
    ) {
        let job = ParseJob {
            url: url.to_string(),
            domain: domain.to_string(),
            depth,
            html_bytes,
            content_type,
            crawled_timestamp: Utc::now().timestamp(),
            status_code,
        };
        let bytes = match job.to_bytes() {
            Ok(b) => b,
            Err(e) => {
                warn!(url, error = %e, "failed to serialize ParseJob");
                return;
            }
        };

        wait_for_capacity(
            self.store.as_ref(),
            FETCH_QUEUE_KEY,
            self.config.parse_queue_soft_limit,
            self.config.parse_queue_hard_limit,
        )
        .await;

        if let Err(e) = self.store.queue_push_bytes(FETCH_QUEUE_KEY, bytes).await {
            warn!(url, error = %e, "failed to push parse job");
        }
    }

    async fn record_visited(&self, url: &str, status_code: u16, content_type: Option<String>, content_path: Option<String>) {
        let key = format!("visited:{}", visited_key_prefix(url));
        let mut fields = vec![
            ("url".to_string(), url.to_string()),
            ("status_code".to_string(), status_code.to_string()),
            ("fetched_at".to_string(), Utc::now().timestamp().to_string()),
        ];
        if let Some(ct) = content_type {
            fields.push(("content_type".to_string(), ct));
        }
        if let Some(path) = content_path {
            fields.push(("content_path".to_string(), path));
        }
        let field_refs: Vec<(&str, String)> = fields.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        if let Err(e) = self.store.hash_set(&key, &field_refs).await {
            warn!(url, error = %e, "failed to write visited record");
        }
    }
}

struct FetchedPage {
    final_url: String,
    status: reqwest::StatusCode,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use podcrawler_politeness::PolitenessEnforcer;
    use podcrawler_store::MemoryStoreClient;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn make_pool(store: Arc<dyn StoreClient>) -> (Arc<FetcherWorkerPool>, Arc<FrontierManager>) {
        let politeness = Arc::new(PolitenessEnforcer::new(
            store.clone(),
            "podcrawler-test/1.0".to_string(),
            0,
            86_400,
            5,
        ));
        let frontier = Arc::new(FrontierManager::new(0, 1, store.clone(), politeness, 10_000, 0.001));
        frontier.initialize(false).await.unwrap();
        let pool = Arc::new(FetcherWorkerPool::new(
            store,
            frontier.clone(),
            FetcherConfig {
                http_timeout_seconds: 5,
                http_max_retries: 1,
                parse_queue_soft_limit: 20_000,
                parse_queue_hard_limit: 80_000,
                max_body_size_bytes: 10 * 1024 * 1024,
                user_agent: "podcrawler-test/1.0".to_string(),
            },
        ));
        (pool, frontier)
    }

    #[tokio::test]
    async fn successful_html_fetch_publishes_parse_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body>hi</body></html>"),
            )
            .mount(&server)
            .await;

        let store: Arc<dyn StoreClient> = Arc::new(MemoryStoreClient::new());
        let (pool, frontier) = make_pool(store.clone()).await;

        let url = format!("{}/page", server.uri());
        frontier.add_urls_batch(&[url], 0).await;
        let next = frontier.get_next_url().await.unwrap();

        pool.fetch_one(0, &next.url, &next.domain, next.depth).await;

        assert_eq!(store.queue_len("fetch:queue").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn server_error_records_visited_without_enqueue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store: Arc<dyn StoreClient> = Arc::new(MemoryStoreClient::new());
        let (pool, frontier) = make_pool(store.clone()).await;

        let url = format!("{}/broken", server.uri());
        frontier.add_urls_batch(&[url], 0).await;
        let next = frontier.get_next_url().await.unwrap();

        pool.fetch_one(0, &next.url, &next.domain, next.depth).await;

        assert_eq!(store.queue_len("fetch:queue").await.unwrap(), 0);
        let key = format!("visited:{}", visited_key_prefix(&next.url));
        let record = store.hash_get_all(&key).await.unwrap();
        assert_eq!(record.get("status_code").map(|s| s.as_str()), Some("500"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_without_enqueue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("x".repeat(1024)),
            )
            .mount(&server)
            .await;

        let store: Arc<dyn StoreClient> = Arc::new(MemoryStoreClient::new());
        let politeness = Arc::new(PolitenessEnforcer::new(
            store.clone(),
            "podcrawler-test/1.0".to_string(),
            0,
            86_400,
            5,
        ));
        let frontier = Arc::new(FrontierManager::new(0, 1, store.clone(), politeness, 10_000, 0.001));
        frontier.initialize(false).await.unwrap();
        let pool = Arc::new(FetcherWorkerPool::new(
            store.clone(),
            frontier.clone(),
            FetcherConfig {
                http_timeout_seconds: 5,
                http_max_retries: 1,
                parse_queue_soft_limit: 20_000,
                parse_queue_hard_limit: 80_000,
                max_body_size_bytes: 100,
                user_agent: "podcrawler-test/1.0".to_string(),
            },
        ));

        let url = format!("{}/huge", server.uri());
        frontier.add_urls_batch(&[url], 0).await;
        let next = frontier.get_next_url().await.unwrap();

        pool.fetch_one(0, &next.url, &next.domain, next.depth).await;

        assert_eq!(store.queue_len("fetch:queue").await.unwrap(), 0);
        let key = format!("visited:{}", visited_key_prefix(&next.url));
        let record = store.hash_get_all(&key).await.unwrap();
        assert_eq!(record.get("status_code").map(|s| s.as_str()), Some("0"));
    }
}
