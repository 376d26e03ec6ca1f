// Global configuration constants - single source of truth

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub struct Config;

impl Config {
    // Store
    pub const DATA_DIR: &'static str = "./data";
    pub const STORE_NAME: &'static str = "crawl_state.redb";

    // Worker pool and politeness
    pub const WORKERS: usize = 4;
    pub const TIME_DELAY_SECS: f64 = 0.5;

    // Near-duplicate detection
    pub const NEAR_THRESHOLD: u32 = 3;
    pub const FINGERPRINT_BITS: u32 = 64;

    // HTTP/Network config
    pub const USER_AGENT: &'static str = "CorpusCrawler/0.1";
    pub const TIMEOUT_SECS: u64 = 20;
    pub const MAX_CONTENT_SIZE: usize = 10 * 1024 * 1024; // 10MB
    pub const MAX_REDIRECTS: usize = 5;

    // Reporting
    pub const TOP_WORDS: usize = 50;

    pub const SEED_URLS: &'static [&'static str] = &[
        "https://www.ics.uci.edu",
        "https://www.cs.uci.edu",
        "https://www.informatics.uci.edu",
        "https://www.stat.uci.edu",
    ];

    pub const ALLOWED_DOMAINS: &'static [&'static str] = &[
        "ics.uci.edu",
        "cs.uci.edu",
        "informatics.uci.edu",
        "stat.uci.edu",
    ];
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker pool size must be at least 1")]
    NoWorkers,

    #[error("fingerprint width must be between 1 and 64 bits, got {0}")]
    FingerprintBits(u32),

    #[error("near-duplicate threshold {threshold} exceeds fingerprint width {bits}")]
    ThresholdTooLarge { threshold: u32, bits: u32 },

    #[error("at least one seed URL is required")]
    NoSeeds,

    #[error("seed is not an absolute http(s) URL: {0}")]
    InvalidSeed(String),

    #[error("inter-request delay must be a non-negative number of seconds that fits in a duration")]
    InvalidDelay,
}

/// Options for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub data_dir: PathBuf,
    pub store_name: String,
    /// Discard persisted state and start over from `seed_urls`.
    pub restart: bool,
    pub seed_urls: Vec<String>,
    pub workers: usize,
    /// Sleep applied by each worker after every processed URL.
    pub time_delay: Duration,
    pub near_threshold: u32,
    pub fingerprint_bits: u32,
    /// When false the frontier treats every page as new.
    pub dedup_enabled: bool,
    pub allowed_domains: Vec<String>,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(Config::DATA_DIR),
            store_name: Config::STORE_NAME.to_string(),
            restart: false,
            seed_urls: Config::SEED_URLS.iter().map(|s| s.to_string()).collect(),
            workers: Config::WORKERS,
            time_delay: Duration::from_secs_f64(Config::TIME_DELAY_SECS),
            near_threshold: Config::NEAR_THRESHOLD,
            fingerprint_bits: Config::FINGERPRINT_BITS,
            dedup_enabled: true,
            allowed_domains: Config::ALLOWED_DOMAINS.iter().map(|s| s.to_string()).collect(),
            user_agent: Config::USER_AGENT.to_string(),
            timeout_secs: Config::TIMEOUT_SECS,
        }
    }
}

impl CrawlerConfig {
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_name)
    }

    /// Convert a user-supplied delay in seconds.
    pub fn delay_from_secs(secs: f64) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidDelay)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if !(1..=64).contains(&self.fingerprint_bits) {
            return Err(ConfigError::FingerprintBits(self.fingerprint_bits));
        }
        if self.near_threshold > self.fingerprint_bits {
            return Err(ConfigError::ThresholdTooLarge {
                threshold: self.near_threshold,
                bits: self.fingerprint_bits,
            });
        }
        if self.seed_urls.is_empty() {
            return Err(ConfigError::NoSeeds);
        }
        for seed in &self.seed_urls {
            match Url::parse(seed) {
                Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
                _ => return Err(ConfigError::InvalidSeed(seed.clone())),
            }
        }
        Ok(())
    }
}
