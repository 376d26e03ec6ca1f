use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, ConfigError, CrawlerConfig};

/// CLI entry point so users can control the crawler from the command line.
/// Exit codes: 0=success, 2=invalid arguments, 3=store or I/O error
#[derive(Parser, Debug)]
#[command(name = "corpus_crawler")]
#[command(about = "A polite, resumable single-corpus web crawler")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl from saved state, or from the seeds when there is nothing left to resume.
    Crawl {
        #[arg(short, long, default_value = Config::DATA_DIR, help = "Directory holding the crawl store and logs")]
        data_dir: PathBuf,

        #[arg(long, default_value = Config::STORE_NAME, help = "File name of the crawl store inside the data directory")]
        store_name: String,

        #[arg(long, help = "Discard saved state and start over from the seed URLs")]
        restart: bool,

        #[arg(short, long = "seed", help = "Seed URL (repeatable); defaults to the built-in seed list")]
        seeds: Vec<String>,

        #[arg(short, long, default_value_t = Config::WORKERS, help = "Number of worker threads")]
        workers: usize,

        #[arg(long, default_value_t = Config::TIME_DELAY_SECS, help = "Seconds each worker sleeps after every request")]
        delay: f64,

        #[arg(long = "allowed-domain", help = "Allowed host suffix (repeatable); defaults to the built-in list")]
        allowed_domains: Vec<String>,

        #[arg(long, default_value_t = Config::NEAR_THRESHOLD, help = "Maximum SimHash Hamming distance for near-duplicates")]
        near_threshold: u32,

        #[arg(long, default_value_t = Config::FINGERPRINT_BITS, help = "SimHash fingerprint width in bits (1-64)")]
        fingerprint_bits: u32,

        #[arg(long, help = "Disable content deduplication")]
        no_dedup: bool,

        #[arg(short, long, default_value = Config::USER_AGENT, help = "User agent string for requests")]
        user_agent: String,

        #[arg(short, long, default_value_t = Config::TIMEOUT_SECS, help = "Request timeout in seconds")]
        timeout: u64,
    },

    /// Print corpus statistics from a crawl store.
    Report {
        #[arg(short, long, default_value = Config::DATA_DIR, help = "Directory holding the crawl store")]
        data_dir: PathBuf,

        #[arg(long, default_value = Config::STORE_NAME, help = "File name of the crawl store inside the data directory")]
        store_name: String,

        #[arg(long, default_value_t = Config::TOP_WORDS, help = "Number of most common words to list")]
        top: usize,
    },
}

impl Cli {
    /// Parse CLI arguments; on error clap prints help and exits with code 2.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Commands {
    /// Build and validate the crawl configuration for a `crawl` command.
    pub fn crawler_config(&self) -> Option<Result<CrawlerConfig, ConfigError>> {
        match self {
            Commands::Crawl {
                data_dir,
                store_name,
                restart,
                seeds,
                workers,
                delay,
                allowed_domains,
                near_threshold,
                fingerprint_bits,
                no_dedup,
                user_agent,
                timeout,
            } => Some(build_config(CrawlArgs {
                data_dir,
                store_name,
                restart: *restart,
                seeds,
                workers: *workers,
                delay: *delay,
                allowed_domains,
                near_threshold: *near_threshold,
                fingerprint_bits: *fingerprint_bits,
                no_dedup: *no_dedup,
                user_agent,
                timeout: *timeout,
            })),
            Commands::Report { .. } => None,
        }
    }
}

/// Borrowed view of the `crawl` flags.
struct CrawlArgs<'a> {
    data_dir: &'a PathBuf,
    store_name: &'a str,
    restart: bool,
    seeds: &'a [String],
    workers: usize,
    delay: f64,
    allowed_domains: &'a [String],
    near_threshold: u32,
    fingerprint_bits: u32,
    no_dedup: bool,
    user_agent: &'a str,
    timeout: u64,
}

fn build_config(args: CrawlArgs<'_>) -> Result<CrawlerConfig, ConfigError> {
    let defaults = CrawlerConfig::default();
    let config = CrawlerConfig {
        data_dir: args.data_dir.clone(),
        store_name: args.store_name.to_string(),
        restart: args.restart,
        seed_urls: if args.seeds.is_empty() {
            defaults.seed_urls
        } else {
            args.seeds.to_vec()
        },
        workers: args.workers,
        time_delay: CrawlerConfig::delay_from_secs(args.delay)?,
        near_threshold: args.near_threshold,
        fingerprint_bits: args.fingerprint_bits,
        dedup_enabled: !args.no_dedup,
        allowed_domains: if args.allowed_domains.is_empty() {
            defaults.allowed_domains
        } else {
            args.allowed_domains.to_vec()
        },
        user_agent: args.user_agent.to_string(),
        timeout_secs: args.timeout,
    };
    config.validate()?;
    Ok(config)
}
