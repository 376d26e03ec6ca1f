use corpus_crawler::tokenizer::{tokenize, word_frequencies};
use corpus_crawler::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Serves fixed HTML bodies; unknown URLs get an empty 404.
struct StaticSite {
    pages: HashMap<&'static str, &'static str>,
}

impl Fetcher for StaticSite {
    fn fetch(&self, url: &str) -> FetchResult {
        match self.pages.get(url) {
            Some(body) => FetchResult::ok(url, 200, Some("text/html; charset=utf-8".to_string()), body.as_bytes().to_vec()),
            None => FetchResult::ok(url, 404, Some("text/html".to_string()), Vec::new()),
        }
    }
}

fn test_config(dir: &TempDir, seeds: &[&str]) -> CrawlerConfig {
    CrawlerConfig {
        data_dir: dir.path().to_path_buf(),
        restart: false,
        seed_urls: seeds.iter().map(|s| s.to_string()).collect(),
        workers: 2,
        time_delay: Duration::ZERO,
        allowed_domains: vec!["cs.uci.edu".to_string()],
        ..CrawlerConfig::default()
    }
}

fn policy(config: &CrawlerConfig) -> Arc<dyn UrlPolicy> {
    Arc::new(DomainPolicy::new(config.allowed_domains.clone()))
}

fn tokens(text: &str) -> TokenCounts {
    word_frequencies(tokenize(text))
}

#[test]
fn test_crawl_follows_allowed_links_only() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &["http://x.cs.uci.edu/"]);
    let site = StaticSite {
        pages: HashMap::from([(
            "http://x.cs.uci.edu",
            r#"<html><body><p>Seed page text</p>
               <a href="http://y.cs.uci.edu/a">inside</a>
               <a href="http://example.com/b">outside</a></body></html>"#,
        )]),
    };

    let frontier = Arc::new(Frontier::open(&config, policy(&config)).unwrap());
    let crawler = Crawler::new(&config, Arc::clone(&frontier), Arc::new(site), Arc::new(HtmlExtractor));
    let summary = crawler.run().unwrap();

    assert_eq!(summary.stats.processed, 2);
    assert_eq!(summary.stats.links_enqueued, 1);

    let subdomains = frontier.subdomain_counts();
    assert_eq!(subdomains.get("y.cs.uci.edu"), Some(&1));
    assert!(!subdomains.contains_key("example.com"));

    assert_eq!(frontier.token_counts().get("seed"), Some(&1));
    assert_eq!(frontier.store().url_counts().unwrap(), (2, 2));

    let seed_hash = frontier.policy().hash("http://x.cs.uci.edu");
    assert!(frontier.store().get_url(&seed_hash).unwrap().unwrap().completed);

    let report = CrawlReport::from_frontier(&frontier, 10).unwrap();
    assert_eq!(report.unique_pages, 1);
    assert_eq!(report.longest_page.url.as_deref(), Some("http://x.cs.uci.edu"));
}

#[test]
fn test_restart_rebuilds_pending_and_dedup() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &["http://seed.cs.uci.edu/"]);
    let page = tokens("research group publications and people");

    {
        let frontier = Frontier::open(&config, policy(&config)).unwrap();
        frontier.enqueue("http://a.cs.uci.edu/one").unwrap();
        frontier.enqueue("http://b.cs.uci.edu/two").unwrap();
        frontier.mark_complete("http://seed.cs.uci.edu/").unwrap();
        assert_eq!(frontier.check_content(&page).unwrap(), DedupDecision::Unique);
        frontier.record_discovered_link("a.cs.uci.edu").unwrap();
    }

    // A record written by an older run whose URL the policy now rejects.
    {
        let store = CrawlStore::open(config.store_path()).unwrap();
        let url = "http://a.cs.uci.edu/file.pdf";
        store
            .insert_if_absent(&url_utils::url_hash(url), &UrlRecord::pending(url.to_string()))
            .unwrap();
    }

    let frontier = Frontier::open(&config, policy(&config)).unwrap();
    let mut pending = Vec::new();
    while let Some(url) = frontier.next_url() {
        pending.push(url);
    }
    pending.sort();
    assert_eq!(pending, vec!["http://a.cs.uci.edu/one", "http://b.cs.uci.edu/two"]);

    assert!(frontier.is_duplicate(&page).unwrap());
    assert_eq!(frontier.subdomain_counts().get("a.cs.uci.edu"), Some(&1));
}

#[test]
fn test_warm_start_with_nothing_pending_reseeds() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &["http://seed.cs.uci.edu/"]);

    {
        let frontier = Frontier::open(&config, policy(&config)).unwrap();
        let url = frontier.next_url().unwrap();
        frontier.mark_complete(&url).unwrap();
    }

    // The seed is already known, so reseeding adds nothing and the queue stays empty.
    let frontier = Frontier::open(&config, policy(&config)).unwrap();
    assert_eq!(frontier.pending_len(), 0);
    drop(frontier);

    let restarted = CrawlerConfig { restart: true, ..config };
    let frontier = Frontier::open(&restarted, policy(&restarted)).unwrap();
    assert_eq!(frontier.pending_len(), 1);
    assert_eq!(frontier.store().url_counts().unwrap(), (1, 0));
}

#[test]
fn test_identical_pages_are_exact_duplicates() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &["http://seed.cs.uci.edu/"]);
    let frontier = Frontier::open(&config, policy(&config)).unwrap();

    let first = tokens("the same words in the same order");
    let second = tokens("order same words the in same the");

    assert_eq!(frontier.check_content(&first).unwrap(), DedupDecision::Unique);
    assert_eq!(frontier.check_content(&second).unwrap(), DedupDecision::ExactDuplicate);
    assert_eq!(frontier.indexed_pages(), 1);
}

#[test]
fn test_report_reads_persisted_aggregates() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir, &["http://seed.cs.uci.edu/"]);

    {
        let frontier = Frontier::open(&config, policy(&config)).unwrap();
        frontier.merge_tokens(&tokens("alpha beta beta gamma gamma gamma")).unwrap();
        frontier.record_discovered_link("seed.cs.uci.edu").unwrap();
        frontier.record_discovered_link("seed.cs.uci.edu").unwrap();
    }

    let store = CrawlStore::open(config.store_path()).unwrap();
    let report = CrawlReport::from_store(&store, 2).unwrap();
    assert_eq!(report.unique_pages, 2);
    assert_eq!(
        report.top_words,
        vec![("gamma".to_string(), 3), ("beta".to_string(), 2)]
    );
}
