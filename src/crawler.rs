use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::CrawlerConfig;
use crate::frontier::Frontier;
use crate::network::Fetcher;
use crate::parser::Extractor;
use crate::state::StateError;
use crate::worker::{Worker, WorkerStats};

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),

    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

/// Totals for a finished crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub workers: usize,
    pub stats: WorkerStats,
    pub elapsed: Duration,
}

impl std::fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} workers processed {} urls in {:.1}s ({} duplicates, {} failed fetches, {} links enqueued)",
            self.workers,
            self.stats.processed,
            self.elapsed.as_secs_f64(),
            self.stats.duplicates,
            self.stats.failed_fetches,
            self.stats.links_enqueued
        )
    }
}

/// Fixed-size pool of OS-thread workers sharing one frontier.
pub struct Crawler {
    workers: usize,
    time_delay: Duration,
    frontier: Arc<Frontier>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    shutdown: Arc<AtomicBool>,
}

impl Crawler {
    pub fn new(
        config: &CrawlerConfig,
        frontier: Arc<Frontier>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            workers: config.workers.max(1),
            time_delay: config.time_delay,
            frontier,
            fetcher,
            extractor,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked by every worker before taking a new URL.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run all workers to completion.
    ///
    /// Workers stop independently when they find the frontier empty; there is no barrier
    /// waiting for siblings that may still enqueue work. The first store error is returned
    /// after every thread has been joined.
    pub fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let start = Instant::now();
        tracing::info!(
            workers = self.workers,
            pending = self.frontier.pending_len(),
            delay_ms = self.time_delay.as_millis() as u64,
            "starting crawl"
        );

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let worker = Worker::new(
                id,
                Arc::clone(&self.frontier),
                Arc::clone(&self.fetcher),
                Arc::clone(&self.extractor),
                self.time_delay,
                Arc::clone(&self.shutdown),
            );
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker.run())
                .map_err(CrawlError::Spawn)?;
            handles.push((id, handle));
        }

        let mut stats = WorkerStats::default();
        let mut first_error = None;
        for (id, handle) in handles {
            match handle.join() {
                Ok(Ok(worker_stats)) => stats.merge(&worker_stats),
                Ok(Err(e)) => {
                    first_error.get_or_insert(CrawlError::State(e));
                }
                Err(_) => {
                    tracing::error!(worker = id, "worker thread panicked");
                    first_error.get_or_insert(CrawlError::WorkerPanicked(id));
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let summary = CrawlSummary {
            workers: self.workers,
            stats,
            elapsed: start.elapsed(),
        };
        tracing::info!("{}", summary);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::DedupIndex;
    use crate::network::FetchResult;
    use crate::parser::HtmlExtractor;
    use crate::state::CrawlStore;
    use crate::url_utils::{DomainPolicy, UrlPolicy};
    use tempfile::TempDir;

    /// Every page links to two children until depth 3, all with distinct text.
    struct TreeFetcher;

    impl Fetcher for TreeFetcher {
        fn fetch(&self, url: &str) -> FetchResult {
            let depth = url.matches("/n").count();
            let mut body = format!("<p>unique page {}</p>", url.replace(['/', ':', '.'], " "));
            if depth < 3 {
                body.push_str(&format!("<a href=\"{url}/n0\">a</a><a href=\"{url}/n1\">b</a>"));
            }
            FetchResult::ok(url, 200, Some("text/html".to_string()), body.into_bytes())
        }
    }

    #[test]
    fn test_pool_processes_every_reachable_url_once() {
        let dir = TempDir::new().unwrap();
        let config = CrawlerConfig {
            data_dir: dir.path().to_path_buf(),
            workers: 1,
            time_delay: Duration::ZERO,
            dedup_enabled: false,
            ..CrawlerConfig::default()
        };
        let store = Arc::new(CrawlStore::open(config.store_path()).unwrap());
        let policy: Arc<dyn UrlPolicy> = Arc::new(DomainPolicy::new(["cs.uci.edu"]));
        let frontier = Arc::new(Frontier::new(store, policy, None::<DedupIndex>).unwrap());
        frontier.enqueue("http://x.cs.uci.edu/").unwrap();

        let crawler = Crawler::new(&config, Arc::clone(&frontier), Arc::new(TreeFetcher), Arc::new(HtmlExtractor));
        let summary = crawler.run().unwrap();

        // 1 + 2 + 4 + 8 pages in a binary tree of depth 3.
        assert_eq!(summary.stats.processed, 15);
        assert_eq!(summary.stats.links_enqueued, 14);
        assert_eq!(frontier.store().url_counts().unwrap(), (15, 15));
        assert_eq!(frontier.pending_len(), 0);
    }

    #[test]
    fn test_raised_shutdown_flag_leaves_queue_untouched() {
        let dir = TempDir::new().unwrap();
        let config = CrawlerConfig {
            data_dir: dir.path().to_path_buf(),
            workers: 3,
            time_delay: Duration::ZERO,
            ..CrawlerConfig::default()
        };
        let store = Arc::new(CrawlStore::open(config.store_path()).unwrap());
        let policy: Arc<dyn UrlPolicy> = Arc::new(DomainPolicy::new(["cs.uci.edu"]));
        let frontier = Arc::new(Frontier::new(store, policy, None).unwrap());
        frontier.enqueue("http://x.cs.uci.edu/").unwrap();

        let crawler = Crawler::new(&config, Arc::clone(&frontier), Arc::new(TreeFetcher), Arc::new(HtmlExtractor));
        crawler.shutdown_handle().store(true, std::sync::atomic::Ordering::Release);
        let summary = crawler.run().unwrap();

        assert_eq!(summary.workers, 3);
        assert_eq!(summary.stats, WorkerStats::default());
        assert_eq!(frontier.pending_len(), 1);
        assert_eq!(frontier.store().url_counts().unwrap(), (1, 0));
    }
}
