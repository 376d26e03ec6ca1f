use redb::{Database, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::dedup::TokenCounts;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("Database creation error: {0}")]
    RedbCreate(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// One discovered URL, keyed in the store by the hash of its normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub url: String,
    pub completed: bool,
}

impl UrlRecord {
    pub fn pending(url: String) -> Self {
        Self { url, completed: false }
    }

    pub fn completed(url: String) -> Self {
        Self { url, completed: true }
    }
}

/// Page with the highest word count seen so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongestPage {
    pub words: u64,
    pub url: Option<String>,
}

/// Persisted form of the dedup index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupSnapshot {
    pub digests: Vec<String>,
    pub fingerprints: Vec<u64>,
}

/// Result of reading every URL record during a warm start.
#[derive(Debug, Default)]
pub struct UrlScan {
    pub records: Vec<UrlRecord>,
    /// Entries whose value could not be decoded; skipped.
    pub malformed: usize,
}

// ============================================================================
// DATABASE SCHEMA
// ============================================================================

const URLS: TableDefinition<'static, &str, &[u8]> = TableDefinition::new("urls");
const SUBDOMAINS: TableDefinition<'static, &str, u64> = TableDefinition::new("subdomains");
const TOKENS: TableDefinition<'static, &str, u64> = TableDefinition::new("tokens");
const META: TableDefinition<'static, &str, &[u8]> = TableDefinition::new("meta");

const LONGEST_PAGE: &str = "longest_page";
const DEDUP_DIGESTS: &str = "dedup_digests";
const DEDUP_FINGERPRINTS: &str = "dedup_fingerprints";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StateError> {
    serde_json::to_vec(value).map_err(|e| StateError::Serialization(format!("Serialize failed: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StateError> {
    serde_json::from_slice(bytes).map_err(|e| StateError::Serialization(format!("Deserialize failed: {}", e)))
}

/// Durable crawl store backed by a single redb file.
///
/// Every mutating call commits its own write transaction before returning, so callers can
/// publish in-memory state knowing the change is already on disk.
pub struct CrawlStore {
    db: Arc<Database>,
}

impl CrawlStore {
    /// Open (or create) the store and make sure every table and meta entry exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _urls = write_txn.open_table(URLS)?;
            let _subdomains = write_txn.open_table(SUBDOMAINS)?;
            let _tokens = write_txn.open_table(TOKENS)?;
            let mut meta = write_txn.open_table(META)?;

            let defaults = [
                (LONGEST_PAGE, encode(&LongestPage::default())?),
                (DEDUP_DIGESTS, encode(&Vec::<String>::new())?),
                (DEDUP_FINGERPRINTS, encode(&Vec::<u64>::new())?),
            ];
            for (key, value) in defaults {
                let missing = meta.get(key)?.is_none();
                if missing {
                    meta.insert(key, value.as_slice())?;
                }
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Delete any existing store at `path` and open a fresh one.
    pub fn reset<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Self::open(path)
    }

    // ========================================================================
    // URL RECORDS
    // ========================================================================

    /// Insert a record unless the hash is already known. Returns true if inserted.
    pub fn insert_if_absent(&self, hash: &str, record: &UrlRecord) -> Result<bool, StateError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(URLS)?;
            let exists = table.get(hash)?.is_some();
            if exists {
                drop(table);
                write_txn.abort()?;
                return Ok(false);
            }
            let bytes = encode(record)?;
            table.insert(hash, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    /// Store the record as completed. Returns whether a record existed beforehand.
    pub fn mark_complete(&self, hash: &str, url: &str) -> Result<bool, StateError> {
        let write_txn = self.db.begin_write()?;
        let existed;
        {
            let mut table = write_txn.open_table(URLS)?;
            existed = table.get(hash)?.is_some();
            let bytes = encode(&UrlRecord::completed(url.to_string()))?;
            table.insert(hash, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(existed)
    }

    pub fn get_url(&self, hash: &str) -> Result<Option<UrlRecord>, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(URLS)?;
        let record = match table.get(hash)? {
            Some(bytes) => Some(decode(bytes.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Read every URL record, skipping entries that fail to decode.
    pub fn scan_urls(&self) -> Result<UrlScan, StateError> {
        let mut scan = UrlScan::default();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(URLS)?;

        for result in table.iter()? {
            let (key, value) = result?;
            match decode::<UrlRecord>(value.value()) {
                Ok(record) => scan.records.push(record),
                Err(e) => {
                    tracing::warn!(key = key.value(), error = %e, "skipping malformed url record");
                    scan.malformed += 1;
                }
            }
        }

        Ok(scan)
    }

    /// Total and completed URL record counts.
    pub fn url_counts(&self) -> Result<(usize, usize), StateError> {
        let scan = self.scan_urls()?;
        let completed = scan.records.iter().filter(|r| r.completed).count();
        Ok((scan.records.len() + scan.malformed, completed))
    }

    #[cfg(test)]
    pub(crate) fn insert_raw_url(&self, hash: &str, bytes: &[u8]) -> Result<(), StateError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(URLS)?;
            table.insert(hash, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========================================================================
    // AGGREGATES
    // ========================================================================

    /// Add one to a host's discovered-link counter and return the new value.
    pub fn increment_subdomain(&self, host: &str) -> Result<u64, StateError> {
        let write_txn = self.db.begin_write()?;
        let updated;
        {
            let mut table = write_txn.open_table(SUBDOMAINS)?;
            let current = table.get(host)?.map(|v| v.value()).unwrap_or(0);
            updated = current + 1;
            table.insert(host, updated)?;
        }
        write_txn.commit()?;
        Ok(updated)
    }

    pub fn load_subdomains(&self) -> Result<HashMap<String, u64>, StateError> {
        self.load_counts(SUBDOMAINS)
    }

    /// Add every frequency into the corpus token table in one transaction.
    pub fn merge_tokens(&self, tokens: &TokenCounts) -> Result<(), StateError> {
        if tokens.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TOKENS)?;
            for (token, count) in tokens {
                let current = table.get(token.as_str())?.map(|v| v.value()).unwrap_or(0);
                table.insert(token.as_str(), current.saturating_add(*count))?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn load_tokens(&self) -> Result<HashMap<String, u64>, StateError> {
        self.load_counts(TOKENS)
    }

    fn load_counts(&self, definition: TableDefinition<'static, &'static str, u64>) -> Result<HashMap<String, u64>, StateError> {
        let mut counts = HashMap::new();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(definition)?;
        for result in table.iter()? {
            let (key, value) = result?;
            counts.insert(key.value().to_string(), value.value());
        }
        Ok(counts)
    }

    // ========================================================================
    // META ENTRIES
    // ========================================================================

    fn load_meta<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, StateError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META)?;
        let value = match table.get(key)? {
            Some(bytes) => decode(bytes.value())?,
            None => T::default(),
        };
        Ok(value)
    }

    pub fn load_longest_page(&self) -> Result<LongestPage, StateError> {
        self.load_meta(LONGEST_PAGE)
    }

    pub fn save_longest_page(&self, page: &LongestPage) -> Result<(), StateError> {
        let bytes = encode(page)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(META)?;
            table.insert(LONGEST_PAGE, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn load_dedup_snapshot(&self) -> Result<DedupSnapshot, StateError> {
        Ok(DedupSnapshot {
            digests: self.load_meta(DEDUP_DIGESTS)?,
            fingerprints: self.load_meta(DEDUP_FINGERPRINTS)?,
        })
    }

    /// Replace both dedup entries atomically.
    pub fn save_dedup_snapshot(&self, digests: &[String], fingerprints: &[u64]) -> Result<(), StateError> {
        let digest_bytes = encode(&digests)?;
        let fingerprint_bytes = encode(&fingerprints)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(META)?;
            table.insert(DEDUP_DIGESTS, digest_bytes.as_slice())?;
            table.insert(DEDUP_FINGERPRINTS, fingerprint_bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
