//! Corpus statistics derived from the frontier's aggregates.

use std::collections::HashMap;
use std::fmt;

use crate::frontier::Frontier;
use crate::state::{CrawlStore, LongestPage, StateError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Sum of all subdomain counters.
    pub unique_pages: u64,
    pub total_urls: usize,
    pub completed_urls: usize,
    /// Most frequent tokens, highest count first, ties broken alphabetically.
    pub top_words: Vec<(String, u64)>,
    /// Subdomains sorted by name.
    pub subdomains: Vec<(String, u64)>,
    pub longest_page: LongestPage,
}

impl CrawlReport {
    pub fn from_frontier(frontier: &Frontier, top: usize) -> Result<Self, StateError> {
        let (total_urls, completed_urls) = frontier.store().url_counts()?;
        Ok(Self::build(
            frontier.subdomain_counts(),
            frontier.token_counts(),
            frontier.longest_page(),
            total_urls,
            completed_urls,
            top,
        ))
    }

    pub fn from_store(store: &CrawlStore, top: usize) -> Result<Self, StateError> {
        let (total_urls, completed_urls) = store.url_counts()?;
        Ok(Self::build(
            store.load_subdomains()?,
            store.load_tokens()?,
            store.load_longest_page()?,
            total_urls,
            completed_urls,
            top,
        ))
    }

    fn build(
        subdomains: HashMap<String, u64>,
        tokens: HashMap<String, u64>,
        longest_page: LongestPage,
        total_urls: usize,
        completed_urls: usize,
        top: usize,
    ) -> Self {
        let unique_pages = subdomains.values().sum();

        let mut top_words: Vec<(String, u64)> = tokens.into_iter().collect();
        top_words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_words.truncate(top);

        let mut subdomains: Vec<(String, u64)> = subdomains.into_iter().collect();
        subdomains.sort();

        Self {
            unique_pages,
            total_urls,
            completed_urls,
            top_words,
            subdomains,
            longest_page,
        }
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total unique pages = {}", self.unique_pages)?;
        writeln!(f, "URLs discovered = {} ({} completed)", self.total_urls, self.completed_urls)?;
        match &self.longest_page.url {
            Some(url) => writeln!(f, "Longest page = {} ({} words)", url, self.longest_page.words)?,
            None => writeln!(f, "Longest page = none")?,
        }
        writeln!(f, "{} most common words:", self.top_words.len())?;
        for (word, count) in &self.top_words {
            writeln!(f, "{}\t{}", word, count)?;
        }
        writeln!(f, "Subdomains:")?;
        for (subdomain, count) in &self.subdomains {
            writeln!(f, "{}, {}", subdomain, count)?;
        }
        Ok(())
    }
}
