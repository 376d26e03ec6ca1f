use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::CrawlerConfig;
use crate::dedup::{DedupDecision, DedupIndex, TokenCounts};
use crate::state::{CrawlStore, LongestPage, StateError, UrlRecord};
use crate::tokenizer::total_words;
use crate::url_utils::UrlPolicy;

/// How a `mark_complete` call was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Completed,
    /// The URL had never been enqueued; a completed record was created anyway.
    Unseen,
}

/// Persistent crawl frontier: the pending URL stack plus all corpus-wide aggregates.
///
/// Each sub-state has its own lock. Mutations commit to the store while holding that
/// lock and only then update the in-memory copy, so a crash never leaves memory ahead of
/// disk.
pub struct Frontier {
    store: Arc<CrawlStore>,
    policy: Arc<dyn UrlPolicy>,
    /// Pending URLs, popped from the end.
    pending: Mutex<Vec<String>>,
    subdomains: Mutex<HashMap<String, u64>>,
    tokens: Mutex<HashMap<String, u64>>,
    longest_page: Mutex<LongestPage>,
    /// `None` when content dedup is disabled; every page is then treated as new.
    dedup: Option<Mutex<DedupIndex>>,
    host_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Frontier {
    /// Load a frontier from an already opened store without seeding it.
    ///
    /// The pending stack is rebuilt from every incomplete record that still passes the
    /// policy, and the dedup index (when given) is restored from the persisted snapshot.
    pub fn new(
        store: Arc<CrawlStore>,
        policy: Arc<dyn UrlPolicy>,
        dedup: Option<DedupIndex>,
    ) -> Result<Self, StateError> {
        let scan = store.scan_urls()?;
        let total = scan.records.len() + scan.malformed;
        let pending: Vec<String> = scan
            .records
            .into_iter()
            .filter(|record| !record.completed && policy.is_allowed(&record.url))
            .map(|record| record.url)
            .collect();

        tracing::info!(
            pending = pending.len(),
            total,
            malformed = scan.malformed,
            "Found {} urls to be downloaded from {} total urls discovered",
            pending.len(),
            total
        );

        let dedup = match dedup {
            Some(mut index) => {
                let snapshot = store.load_dedup_snapshot()?;
                index.restore(snapshot.digests, snapshot.fingerprints);
                tracing::debug!(pages = index.len(), "restored dedup index");
                Some(Mutex::new(index))
            }
            None => {
                tracing::warn!("content dedup disabled; every page will be treated as unique");
                None
            }
        };

        Ok(Self {
            subdomains: Mutex::new(store.load_subdomains()?),
            tokens: Mutex::new(store.load_tokens()?),
            longest_page: Mutex::new(store.load_longest_page()?),
            pending: Mutex::new(pending),
            dedup,
            host_locks: DashMap::new(),
            policy,
            store,
        })
    }

    /// Open the configured store and apply the cold/warm start rules.
    ///
    /// With `restart` set, existing state is discarded and the seeds are enqueued. Otherwise
    /// the saved state is resumed and the seeds are used only if nothing is left to fetch.
    pub fn open(config: &CrawlerConfig, policy: Arc<dyn UrlPolicy>) -> Result<Self, StateError> {
        let path = config.store_path();
        let exists = path.exists();

        let store = if config.restart {
            if exists {
                tracing::info!(path = %path.display(), "Found save file, deleting it");
            }
            CrawlStore::reset(&path)?
        } else {
            if !exists {
                tracing::info!(path = %path.display(), "Did not find save file, starting from seed");
            }
            CrawlStore::open(&path)?
        };

        let dedup = config
            .dedup_enabled
            .then(|| DedupIndex::new(config.near_threshold, config.fingerprint_bits));
        let frontier = Self::new(Arc::new(store), policy, dedup)?;

        if config.restart || frontier.pending_len() == 0 {
            let added = frontier.seed(&config.seed_urls)?;
            tracing::info!(added, "seeded frontier");
        }

        Ok(frontier)
    }

    /// Enqueue every seed URL. Returns how many were new.
    pub fn seed<S: AsRef<str>>(&self, seeds: &[S]) -> Result<usize, StateError> {
        let mut added = 0;
        for seed in seeds {
            if self.enqueue(seed.as_ref())? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Pop the most recently added pending URL.
    pub fn next_url(&self) -> Option<String> {
        self.pending.lock().pop()
    }

    /// Record a URL and make it available to workers. Returns false if it was already known.
    pub fn enqueue(&self, url: &str) -> Result<bool, StateError> {
        let normalized = self.policy.normalize(url);
        let hash = self.policy.hash(&normalized);

        // The store serializes write transactions, so only one caller can insert a hash.
        if !self.store.insert_if_absent(&hash, &UrlRecord::pending(normalized.clone()))? {
            return Ok(false);
        }

        tracing::trace!(url = %normalized, "enqueued");
        self.pending.lock().push(normalized);
        Ok(true)
    }

    pub fn mark_complete(&self, url: &str) -> Result<Completion, StateError> {
        let normalized = self.policy.normalize(url);
        let hash = self.policy.hash(&normalized);

        if self.store.mark_complete(&hash, &normalized)? {
            Ok(Completion::Completed)
        } else {
            tracing::error!(url = %normalized, "Completed url, but have not seen it before");
            Ok(Completion::Unseen)
        }
    }

    /// Count one discovered link for `host`. Returns the new count.
    pub fn record_discovered_link(&self, host: &str) -> Result<u64, StateError> {
        let mut counts = self.subdomains.lock();
        let updated = self.store.increment_subdomain(host)?;
        counts.insert(host.to_string(), updated);
        Ok(updated)
    }

    pub fn merge_tokens(&self, tokens: &TokenCounts) -> Result<(), StateError> {
        let mut aggregate = self.tokens.lock();
        self.store.merge_tokens(tokens)?;
        for (token, count) in tokens {
            let slot = aggregate.entry(token.clone()).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
        Ok(())
    }

    /// Replace the longest-page record if this page has strictly more words.
    /// Returns whether the record changed.
    pub fn update_longest_page(&self, url: &str, tokens: &TokenCounts) -> Result<bool, StateError> {
        let words = total_words(tokens);
        if words == 0 {
            return Ok(false);
        }

        let mut longest = self.longest_page.lock();
        if words <= longest.words {
            return Ok(false);
        }

        let candidate = LongestPage {
            words,
            url: Some(url.to_string()),
        };
        self.store.save_longest_page(&candidate)?;
        *longest = candidate;
        Ok(true)
    }

    /// Check a page against the dedup index, recording and persisting it when new.
    ///
    /// The index lock is held until the snapshot is committed so that two workers cannot
    /// both accept the same content.
    pub fn check_content(&self, tokens: &TokenCounts) -> Result<DedupDecision, StateError> {
        let Some(dedup) = &self.dedup else {
            return Ok(DedupDecision::Unique);
        };

        let mut index = dedup.lock();
        let decision = index.check(tokens);
        if decision == DedupDecision::Unique {
            let (digests, fingerprints) = index.snapshot();
            self.store.save_dedup_snapshot(&digests, &fingerprints)?;
        }
        Ok(decision)
    }

    pub fn is_duplicate(&self, tokens: &TokenCounts) -> Result<bool, StateError> {
        Ok(self.check_content(tokens)?.is_duplicate())
    }

    /// Lock used to serialize fetches against one host, created on first use.
    pub fn host_lock(&self, host: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.host_locks.get(host) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .host_locks
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }

    pub fn policy(&self) -> &dyn UrlPolicy {
        self.policy.as_ref()
    }

    pub fn store(&self) -> &Arc<CrawlStore> {
        &self.store
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn dedup_enabled(&self) -> bool {
        self.dedup.is_some()
    }

    /// Pages recorded as new content by the dedup index.
    pub fn indexed_pages(&self) -> usize {
        self.dedup.as_ref().map(|d| d.lock().len()).unwrap_or(0)
    }

    pub fn subdomain_counts(&self) -> HashMap<String, u64> {
        self.subdomains.lock().clone()
    }

    pub fn token_counts(&self) -> HashMap<String, u64> {
        self.tokens.lock().clone()
    }

    pub fn longest_page(&self) -> LongestPage {
        self.longest_page.lock().clone()
    }
}
