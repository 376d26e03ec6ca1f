use std::process::ExitCode;
use std::sync::Arc;

use corpus_crawler::cli::{Cli, Commands};
use corpus_crawler::config::{ConfigError, CrawlerConfig};
use corpus_crawler::crawler::{CrawlError, Crawler};
use corpus_crawler::frontier::Frontier;
use corpus_crawler::logging;
use corpus_crawler::network::{FetchError, HttpFetcher};
use corpus_crawler::parser::HtmlExtractor;
use corpus_crawler::report::CrawlReport;
use corpus_crawler::state::{CrawlStore, StateError};
use corpus_crawler::url_utils::{DomainPolicy, UrlPolicy};
use corpus_crawler::Config;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MainError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Crawler error: {0}")]
    Crawler(#[from] CrawlError),
}

impl MainError {
    fn exit_code(&self) -> u8 {
        match self {
            MainError::Config(_) => 2,
            _ => 3,
        }
    }
}

fn run_crawl(config: CrawlerConfig) -> Result<(), MainError> {
    let _log_guard = logging::init_logging_in_data_dir(&config.data_dir).map_err(|e| MainError::Logging(e.to_string()))?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        restart = config.restart,
        workers = config.workers,
        dedup = config.dedup_enabled,
        "Crawling {} seed(s)",
        config.seed_urls.len()
    );

    let policy: Arc<dyn UrlPolicy> = Arc::new(DomainPolicy::new(config.allowed_domains.iter()));
    let frontier = Arc::new(Frontier::open(&config, policy)?);
    let fetcher = Arc::new(HttpFetcher::new(&config.user_agent, config.timeout_secs)?);
    let crawler = Crawler::new(&config, Arc::clone(&frontier), fetcher, Arc::new(HtmlExtractor));

    let summary = crawler.run()?;
    println!("{}", summary);
    print!("{}", CrawlReport::from_frontier(&frontier, Config::TOP_WORDS)?);
    Ok(())
}

fn run_report(config: &CrawlerConfig, top: usize) -> Result<(), MainError> {
    let path = config.store_path();
    if !path.exists() {
        let missing = std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no crawl store at {}", path.display()),
        );
        return Err(StateError::Io(missing).into());
    }
    let store = CrawlStore::open(path)?;
    print!("{}", CrawlReport::from_store(&store, top)?);
    Ok(())
}

fn run(cli: Cli) -> Result<(), MainError> {
    match cli.command {
        Commands::Report {
            data_dir,
            store_name,
            top,
        } => {
            let config = CrawlerConfig {
                data_dir,
                store_name,
                ..CrawlerConfig::default()
            };
            run_report(&config, top)
        }
        ref crawl @ Commands::Crawl { .. } => match crawl.crawler_config() {
            Some(config) => run_crawl(config?),
            None => Ok(()),
        },
    }
}

fn main() -> ExitCode {
    match run(Cli::parse_args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
