pub mod cli;
pub mod config;
pub mod crawler;
pub mod dedup;
pub mod frontier;
pub mod logging;
pub mod network;
pub mod parser;
pub mod report;
pub mod state;
pub mod tokenizer;
pub mod url_utils;
pub mod worker;

// Re-export main types for library usage
pub use config::{Config, ConfigError, CrawlerConfig};
pub use crawler::{CrawlError, CrawlSummary, Crawler};
pub use dedup::{DedupDecision, DedupIndex, TokenCounts};
pub use frontier::{Completion, Frontier};
pub use network::{FetchError, FetchResult, Fetcher, HttpFetcher};
pub use parser::{Extractor, HtmlExtractor, PageContent};
pub use report::CrawlReport;
pub use state::{CrawlStore, LongestPage, StateError, UrlRecord};
pub use url_utils::{DomainPolicy, UrlPolicy};
pub use worker::{PageOutcome, Worker, WorkerStats};
