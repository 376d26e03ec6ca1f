use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::frontier::Frontier;
use crate::network::{FetchError, FetchResult, Fetcher};
use crate::parser::{Extractor, PageContent};
use crate::state::StateError;
use crate::url_utils;

/// Per-worker counters, summed by the crawler when the pool finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub duplicates: usize,
    pub failed_fetches: usize,
    pub links_enqueued: usize,
}

impl WorkerStats {
    pub fn merge(&mut self, other: &WorkerStats) {
        self.processed += other.processed;
        self.duplicates += other.duplicates;
        self.failed_fetches += other.failed_fetches;
        self.links_enqueued += other.links_enqueued;
    }
}

/// What happened to one URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub fetched: bool,
    pub duplicate: bool,
    pub links_enqueued: usize,
}

/// One crawl loop. Runs until it sees an empty frontier or the shutdown flag.
pub struct Worker {
    id: usize,
    frontier: Arc<Frontier>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    time_delay: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        id: usize,
        frontier: Arc<Frontier>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        time_delay: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            id,
            frontier,
            fetcher,
            extractor,
            time_delay,
            shutdown,
        }
    }

    /// Process URLs until the frontier is empty.
    ///
    /// A store failure raises the shared shutdown flag so sibling workers stop too, then is
    /// returned to the caller.
    pub fn run(&self) -> Result<WorkerStats, StateError> {
        let mut stats = WorkerStats::default();

        loop {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::info!(worker = self.id, "Shutdown requested. Stopping worker.");
                break;
            }

            let Some(url) = self.frontier.next_url() else {
                tracing::info!(worker = self.id, "Frontier is empty. Stopping worker.");
                break;
            };

            match self.process(&url) {
                Ok(outcome) => {
                    stats.processed += 1;
                    stats.links_enqueued += outcome.links_enqueued;
                    if outcome.duplicate {
                        stats.duplicates += 1;
                    }
                    if !outcome.fetched {
                        stats.failed_fetches += 1;
                    }
                }
                Err(e) => {
                    tracing::error!(worker = self.id, url = %url, error = %e, "store failure, stopping crawl");
                    self.shutdown.store(true, Ordering::Release);
                    return Err(e);
                }
            }

            if !self.time_delay.is_zero() {
                thread::sleep(self.time_delay);
            }
        }

        Ok(stats)
    }

    /// Fetch, extract, dedup and record one URL. The URL is always marked complete.
    pub fn process(&self, url: &str) -> Result<PageOutcome, StateError> {
        let page = self.fetch_politely(url);
        let fetched = page.is_success();
        match &page.error {
            Some(e) => tracing::warn!(worker = self.id, url = %url, error = %e, "fetch failed"),
            None => tracing::info!(
                worker = self.id,
                url = %url,
                status = page.status_code,
                "Downloaded {}, status <{}>",
                url,
                page.status_code
            ),
        }

        let content = self.extract(url, &page);
        let decision = self.frontier.check_content(&content.tokens)?;
        let duplicate = decision.is_duplicate();
        let mut links_enqueued = 0;

        if duplicate {
            tracing::debug!(worker = self.id, url = %url, ?decision, "skipping duplicate content");
        } else {
            self.frontier.merge_tokens(&content.tokens)?;
            self.frontier.update_longest_page(url, &content.tokens)?;

            for link in &content.links {
                if !self.frontier.policy().is_allowed(link) {
                    continue;
                }
                if let Some(host) = url_utils::extract_host(link) {
                    self.frontier.record_discovered_link(&host)?;
                }
                if self.frontier.enqueue(link)? {
                    links_enqueued += 1;
                }
            }
        }

        self.frontier.mark_complete(url)?;

        Ok(PageOutcome {
            fetched,
            duplicate,
            links_enqueued,
        })
    }

    /// Fetch while holding the host's lock so only one worker talks to a host at a time.
    fn fetch_politely(&self, url: &str) -> FetchResult {
        let Some(host) = url_utils::extract_host(url) else {
            return FetchResult::failed(url, FetchError::NetworkError("URL has no host".to_string()));
        };

        let lock = self.frontier.host_lock(&host);
        let _guard = lock.lock();
        self.fetcher.fetch(url)
    }

    /// Extractor panics are contained here and count as an empty page.
    fn extract(&self, url: &str, page: &FetchResult) -> PageContent {
        match panic::catch_unwind(AssertUnwindSafe(|| self.extractor.extract(url, page))) {
            Ok(content) => content,
            Err(_) => {
                tracing::warn!(worker = self.id, url = %url, "extractor panicked; treating page as empty");
                PageContent::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupIndex;
    use crate::state::CrawlStore;
    use crate::url_utils::{DomainPolicy, UrlPolicy};
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Serves canned HTML keyed by URL; anything else is a 404.
    struct ScriptedFetcher {
        pages: HashMap<String, String>,
    }

    impl Fetcher for ScriptedFetcher {
        fn fetch(&self, url: &str) -> FetchResult {
            match self.pages.get(url) {
                Some(body) => FetchResult::ok(url, 200, Some("text/html".to_string()), body.clone().into_bytes()),
                None => FetchResult::ok(url, 404, Some("text/html".to_string()), Vec::new()),
            }
        }
    }

    struct PanickingExtractor;

    impl Extractor for PanickingExtractor {
        fn extract(&self, _url: &str, _page: &FetchResult) -> PageContent {
            panic!("parser bug");
        }
    }

    fn setup(dir: &TempDir) -> Arc<Frontier> {
        let store = Arc::new(CrawlStore::open(dir.path().join("w.redb")).unwrap());
        let policy: Arc<dyn UrlPolicy> = Arc::new(DomainPolicy::new(["cs.uci.edu"]));
        Arc::new(Frontier::new(store, policy, Some(DedupIndex::new(3, 64))).unwrap())
    }

    fn worker(frontier: Arc<Frontier>, pages: &[(&str, &str)], extractor: Arc<dyn Extractor>) -> Worker {
        let fetcher = ScriptedFetcher {
            pages: pages.iter().map(|(u, b)| (u.to_string(), b.to_string())).collect(),
        };
        Worker::new(0, frontier, Arc::new(fetcher), extractor, Duration::ZERO, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_process_filters_links_and_counts_hosts() {
        let dir = TempDir::new().unwrap();
        let frontier = setup(&dir);
        frontier.enqueue("http://x.cs.uci.edu/").unwrap();

        let worker = worker(
            Arc::clone(&frontier),
            &[(
                "http://x.cs.uci.edu",
                "<p>seed page words</p><a href=\"http://y.cs.uci.edu/a\">in</a><a href=\"http://example.com/b\">out</a>",
            )],
            Arc::new(crate::parser::HtmlExtractor),
        );

        let url = frontier.next_url().unwrap();
        let outcome = worker.process(&url).unwrap();
        assert_eq!(outcome, PageOutcome { fetched: true, duplicate: false, links_enqueued: 1 });

        assert_eq!(frontier.subdomain_counts().get("y.cs.uci.edu"), Some(&1));
        assert!(!frontier.subdomain_counts().contains_key("example.com"));
        assert_eq!(frontier.next_url().as_deref(), Some("http://y.cs.uci.edu/a"));
        assert_eq!(frontier.token_counts().get("seed"), Some(&1));
    }

    #[test]
    fn test_duplicate_page_is_not_expanded() {
        let dir = TempDir::new().unwrap();
        let frontier = setup(&dir);
        frontier.enqueue("http://a.cs.uci.edu/").unwrap();
        frontier.enqueue("http://b.cs.uci.edu/").unwrap();

        // Same visible text on both pages; only the link targets differ.
        let worker = worker(
            Arc::clone(&frontier),
            &[
                (
                    "http://a.cs.uci.edu",
                    "<p>shared lecture notes</p><a href=\"http://z.cs.uci.edu/next\">next</a>",
                ),
                (
                    "http://b.cs.uci.edu",
                    "<p>shared lecture notes</p><a href=\"http://w.cs.uci.edu/next\">next</a>",
                ),
            ],
            Arc::new(crate::parser::HtmlExtractor),
        );

        let first = worker.process("http://a.cs.uci.edu").unwrap();
        assert_eq!(first, PageOutcome { fetched: true, duplicate: false, links_enqueued: 1 });

        let second = worker.process("http://b.cs.uci.edu").unwrap();
        assert_eq!(second, PageOutcome { fetched: true, duplicate: true, links_enqueued: 0 });

        let tokens = frontier.token_counts();
        assert_eq!(tokens.get("shared"), Some(&1));
        assert_eq!(tokens.get("next"), Some(&1));

        let subdomains = frontier.subdomain_counts();
        assert_eq!(subdomains.get("z.cs.uci.edu"), Some(&1));
        assert!(!subdomains.contains_key("w.cs.uci.edu"));

        let store = frontier.store();
        for url in ["http://a.cs.uci.edu", "http://b.cs.uci.edu"] {
            let record = store.get_url(&frontier.policy().hash(url)).unwrap().unwrap();
            assert!(record.completed, "{} should be complete", url);
        }
        assert!(store.get_url(&frontier.policy().hash("http://w.cs.uci.edu/next")).unwrap().is_none());
        assert_eq!(store.url_counts().unwrap(), (3, 2));
        assert_eq!(frontier.indexed_pages(), 1);
    }

    #[test]
    fn test_failed_fetch_still_completes() {
        let dir = TempDir::new().unwrap();
        let frontier = setup(&dir);
        frontier.enqueue("http://x.cs.uci.edu/missing").unwrap();

        let worker = worker(Arc::clone(&frontier), &[], Arc::new(crate::parser::HtmlExtractor));
        let stats = worker.run().unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(stats.failed_fetches, 1);
        // Empty pages are duplicates by definition.
        assert_eq!(stats.duplicates, 1);
        assert_eq!(frontier.store().url_counts().unwrap(), (1, 1));
    }

    #[test]
    fn test_extractor_panic_is_contained() {
        let dir = TempDir::new().unwrap();
        let frontier = setup(&dir);
        frontier.enqueue("http://x.cs.uci.edu/").unwrap();

        let worker = worker(Arc::clone(&frontier), &[("http://x.cs.uci.edu", "<p>hi</p>")], Arc::new(PanickingExtractor));
        let stats = worker.run().unwrap();

        assert_eq!(stats.processed, 1);
        assert_eq!(frontier.store().url_counts().unwrap(), (1, 1));
    }

    #[test]
    fn test_shutdown_flag_stops_worker() {
        let dir = TempDir::new().unwrap();
        let frontier = setup(&dir);
        frontier.enqueue("http://x.cs.uci.edu/").unwrap();

        let worker = worker(Arc::clone(&frontier), &[], Arc::new(crate::parser::HtmlExtractor));
        worker.shutdown.store(true, Ordering::Release);
        let stats = worker.run().unwrap();

        assert_eq!(stats, WorkerStats::default());
        assert_eq!(frontier.pending_len(), 1);
    }
}
