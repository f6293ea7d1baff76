use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use podcrawler_core::{hash::visited_key_prefix, pod_for_domain, ParseJob};
use podcrawler_content::save_content_to_file;
use podcrawler_frontier::FrontierManager;
use podcrawler_store::StoreClient;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::extract::HtmlExtractor;

const FETCH_QUEUE_KEY: &str = "fetch:queue";
const SEEN_BLOOM_KEY: &str = "seen:bloom";
const BLOCKING_POP_TIMEOUT: Duration = Duration::from_secs(2);

/// A pod's parser worker pool (spec.md §4.6). Holds one frontier manager per
/// pod (including its own) so cross-pod link routing can write directly to
/// whichever pod actually owns a discovered domain.
pub struct ParserWorkerPool {
    pod_id: usize,
    pod_count: usize,
    store: Arc<dyn StoreClient>,
    frontiers: HashMap<usize, Arc<FrontierManager>>,
    extractor: Arc<dyn HtmlExtractor>,
    data_dirs: Vec<String>,
    worker_count: usize,
}

impl ParserWorkerPool {
    pub fn new(
        pod_id: usize,
        pod_count: usize,
        store: Arc<dyn StoreClient>,
        frontiers: HashMap<usize, Arc<FrontierManager>>,
        extractor: Arc<dyn HtmlExtractor>,
        data_dirs: Vec<String>,
        worker_count: usize,
    ) -> Self {
        Self {
            pod_id,
            pod_count,
            store,
            frontiers,
            extractor,
            data_dirs,
            worker_count,
        }
    }

    /// Spawns `worker_count` cooperative workers and waits for all of them
    /// to observe shutdown and return.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let pool = self.clone();
            let mut worker_shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_id, &mut worker_shutdown).await;
            }));
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
            let payload = match self
                .store
                .queue_blocking_pop_bytes(FETCH_QUEUE_KEY, BLOCKING_POP_TIMEOUT)
                .await
            {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(pod = self.pod_id, worker_id, error = %e, "fetch:queue pop failed");
                    continue;
                }
            };

            let job = match ParseJob::from_bytes(&payload) {
                Ok(job) => job,
                Err(e) => {
                    error!(pod = self.pod_id, worker_id, error = %e, "failed to deserialize ParseJob");
                    continue;
                }
            };

            self.process_job(job).await;
        }
    }

    async fn process_job(&self, job: ParseJob) {
        let extracted = self.extractor.extract(&job.html_bytes, &job.url);

        let content_path = match save_content_to_file(&job.url, &extracted.text, &self.data_dirs).await {
            Ok(path) => path,
            Err(e) => {
                warn!(pod = self.pod_id, url = %job.url, error = %e, "content persistence failed");
                None
            }
        };

        let added = self.route_links(&extracted.links, job.depth + 1).await;

        self.record_visited(&job, content_path.as_deref()).await;

        if added > 0 {
            if let Err(e) = self.store.counter_incr("stats:urls_added", added as i64).await {
                warn!(pod = self.pod_id, error = %e, "failed to increment stats:urls_added");
            }
        }
    }

    /// Groups `links` by owning pod and adds each group to that pod's
    /// frontier, returning the total count of URLs actually newly admitted
    /// (not merely discovered) across every target pod.
    async fn route_links(&self, links: &std::collections::HashSet<String>, depth: u32) -> usize {
        let mut by_pod: HashMap<usize, Vec<String>> = HashMap::new();
        for link in links {
            if let Some(domain) = podcrawler_core::url_utils::extract_domain(link) {
                let target_pod = pod_for_domain(&domain, self.pod_count);
                by_pod.entry(target_pod).or_default().push(link.clone());
            }
        }
        let mut added = 0usize;
        for (pod_id, urls) in by_pod {
            match self.frontiers.get(&pod_id) {
                Some(frontier) => {
                    added += frontier.add_urls_batch(&urls, depth).await;
                }
                None => {
                    warn!(pod_id, "no frontier manager configured for target pod, dropping links");
                }
            }
        }
        added
    }

    async fn record_visited(&self, job: &ParseJob, content_path: Option<&str>) {
        let key = format!("visited:{}", visited_key_prefix(&job.url));
        let mut fields = vec![
            ("url".to_string(), job.url.clone()),
            ("status_code".to_string(), job.status_code.to_string()),
            ("fetched_at".to_string(), job.crawled_timestamp.to_string()),
        ];
        if let Some(path) = content_path {
            fields.push(("content_path".to_string(), path.to_string()));
        }
        if let Some(ct) = &job.content_type {
            fields.push(("content_type".to_string(), ct.clone()));
        }
        let field_refs: Vec<(&str, String)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        if let Err(e) = self.store.hash_set(&key, &field_refs).await {
            warn!(url = %job.url, error = %e, "failed to write visited record");
        }
        if let Err(e) = self
            .store
            .bloom_add_multi(SEEN_BLOOM_KEY, &[job.url.clone()])
            .await
        {
            debug!(url = %job.url, error = %e, "bloom re-add for visited URL failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ScraperHtmlExtractor;
    use podcrawler_politeness::PolitenessEnforcer;
    use podcrawler_store::MemoryStoreClient;

    fn make_frontier(pod_id: usize, pod_count: usize, store: Arc<dyn StoreClient>) -> Arc<FrontierManager> {
        let politeness = Arc::new(PolitenessEnforcer::new(
            store.clone(),
            "podcrawler-test/1.0".to_string(),
            70,
            86_400,
            5,
        ));
        Arc::new(FrontierManager::new(pod_id, pod_count, store, politeness, 10_000, 0.001))
    }

    #[tokio::test]
    async fn processes_job_and_persists_content_and_visited_record() {
        let store: Arc<dyn StoreClient> = Arc::new(MemoryStoreClient::new());
        let frontier = make_frontier(0, 1, store.clone());
        frontier.initialize(false).await.unwrap();
        let mut frontiers = HashMap::new();
        frontiers.insert(0, frontier);

        let dir = tempfile::tempdir().unwrap();
        let pool = ParserWorkerPool::new(
            0,
            1,
            store.clone(),
            frontiers,
            Arc::new(ScraperHtmlExtractor),
            vec![dir.path().to_string_lossy().into_owned()],
            1,
        );

        let job = ParseJob {
            url: "https://a.test/page".to_string(),
            domain: "a.test".to_string(),
            depth: 0,
            html_bytes: b"<html><body>Hello <a href=\"/next\">next</a></body></html>".to_vec(),
            content_type: Some("text/html".to_string()),
            crawled_timestamp: 1_700_000_000,
            status_code: 200,
        };

        pool.process_job(job).await;

        let visited_key = format!(
            "visited:{}",
            podcrawler_core::hash::visited_key_prefix("https://a.test/page")
        );
        let visited = store.hash_get_all(&visited_key).await.unwrap();
        assert_eq!(visited.get("status_code").map(|s| s.as_str()), Some("200"));
        assert!(visited.contains_key("content_path"));

        assert_eq!(
            store.get_str("stats:urls_added").await.unwrap(),
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn stats_urls_added_counts_only_newly_admitted_links() {
        let store: Arc<dyn StoreClient> = Arc::new(MemoryStoreClient::new());
        let frontier = make_frontier(0, 1, store.clone());
        frontier.initialize(false).await.unwrap();

        // pre-seed one of the two links as already seen, so only the other
        // one should count as newly added.
        frontier
            .add_urls_batch(&["https://a.test/already-seen".to_string()], 0)
            .await;

        let mut frontiers = HashMap::new();
        frontiers.insert(0, frontier);

        let dir = tempfile::tempdir().unwrap();
        let pool = ParserWorkerPool::new(
            0,
            1,
            store.clone(),
            frontiers,
            Arc::new(ScraperHtmlExtractor),
            vec![dir.path().to_string_lossy().into_owned()],
            1,
        );

        let job = ParseJob {
            url: "https://a.test/page".to_string(),
            domain: "a.test".to_string(),
            depth: 0,
            html_bytes: b"<html><body><a href=\"/already-seen\">old</a> <a href=\"/brand-new\">new</a></body></html>"
                .to_vec(),
            content_type: Some("text/html".to_string()),
            crawled_timestamp: 1_700_000_000,
            status_code: 200,
        };

        pool.process_job(job).await;

        assert_eq!(
            store.get_str("stats:urls_added").await.unwrap(),
            Some("1".to_string())
        );
    }
}
