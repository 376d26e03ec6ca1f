//! Content deduplication: exact digests of token tables plus a SimHash near-duplicate index.

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

/// Token frequency table for one page, ordered by token.
pub type TokenCounts = BTreeMap<String, u64>;

/// Digest reported for a page with no tokens.
pub const EMPTY_DIGEST_INPUT: &[u8] = b"empty";

/// Hex SHA-256 of the page's canonical token multiset.
///
/// Pairs are serialized as a JSON array in token order, so the encoding can never
/// collide with the sentinel used for empty tables.
pub fn content_digest(tokens: &TokenCounts) -> String {
    let mut hasher = Sha256::new();
    if tokens.is_empty() {
        hasher.update(EMPTY_DIGEST_INPUT);
    } else {
        let pairs: Vec<(&str, u64)> = tokens.iter().map(|(t, c)| (t.as_str(), *c)).collect();
        // Serializing borrowed strings and integers into a Vec cannot fail.
        let raw = serde_json::to_vec(&pairs).unwrap_or_default();
        hasher.update(&raw);
    }
    format!("{:x}", hasher.finalize())
}

/// The top `bits` bits of SHA-256(token), most significant bit first, right-aligned.
pub fn bit_vector(token: &str, bits: u32) -> u64 {
    let hash = Sha256::digest(token.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash[..8]);
    let word = u64::from_be_bytes(head);
    if bits >= 64 {
        word
    } else {
        word >> (64 - bits)
    }
}

/// SimHash of a token table, weighting each token's vector by its frequency.
pub fn fingerprint(tokens: &TokenCounts, bits: u32) -> u64 {
    if tokens.is_empty() {
        return 0;
    }
    let bits = bits.clamp(1, 64);
    let mut accum = vec![0i64; bits as usize];

    for (token, &count) in tokens {
        let weight = i64::try_from(count).unwrap_or(i64::MAX);
        let vector = bit_vector(token, bits);
        for (pos, slot) in accum.iter_mut().enumerate() {
            let shift = bits - 1 - pos as u32;
            if (vector >> shift) & 1 == 1 {
                *slot = slot.saturating_add(weight);
            } else {
                *slot = slot.saturating_sub(weight);
            }
        }
    }

    let mut result = 0u64;
    for (pos, &sum) in accum.iter().enumerate() {
        if sum > 0 {
            result |= 1 << (bits - 1 - pos as u32);
        }
    }
    result
}

fn width_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

pub fn hamming_distance(a: u64, b: u64, bits: u32) -> u32 {
    ((a ^ b) & width_mask(bits)).count_ones()
}

/// Outcome of a duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    /// The page had no tokens.
    Empty,
    ExactDuplicate,
    NearDuplicate { distance: u32 },
    /// Recorded as new content.
    Unique,
}

impl DedupDecision {
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, DedupDecision::Unique)
    }
}

/// Additive index of every unique page seen so far.
///
/// Not synchronized; the frontier owns it behind a single lock so that a check and the
/// insert that follows it happen as one step.
#[derive(Debug, Clone)]
pub struct DedupIndex {
    threshold: u32,
    bits: u32,
    digests: HashSet<String>,
    fingerprints: Vec<u64>,
}

impl DedupIndex {
    pub fn new(threshold: u32, bits: u32) -> Self {
        Self {
            threshold,
            bits: bits.clamp(1, 64),
            digests: HashSet::new(),
            fingerprints: Vec::new(),
        }
    }

    /// Number of unique pages recorded.
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Check a page and record it when it is new.
    pub fn check(&mut self, tokens: &TokenCounts) -> DedupDecision {
        if tokens.is_empty() {
            return DedupDecision::Empty;
        }
        let digest = content_digest(tokens);
        if self.digests.contains(&digest) {
            return DedupDecision::ExactDuplicate;
        }
        let fp = fingerprint(tokens, self.bits);
        self.observe(digest, fp)
    }

    pub fn is_duplicate(&mut self, tokens: &TokenCounts) -> bool {
        self.check(tokens).is_duplicate()
    }

    /// Near-duplicate scan and insert for an already computed digest and fingerprint.
    pub(crate) fn observe(&mut self, digest: String, fp: u64) -> DedupDecision {
        if self.digests.contains(&digest) {
            return DedupDecision::ExactDuplicate;
        }
        if let Some(distance) = self.nearest_within_threshold(fp) {
            return DedupDecision::NearDuplicate { distance };
        }
        self.digests.insert(digest);
        self.fingerprints.push(fp);
        DedupDecision::Unique
    }

    /// First stored fingerprint within the threshold, in discovery order.
    fn nearest_within_threshold(&self, fp: u64) -> Option<u32> {
        self.fingerprints
            .iter()
            .map(|stored| hamming_distance(fp, *stored, self.bits))
            .find(|distance| *distance <= self.threshold)
    }

    /// Merge a persisted snapshot into the index.
    pub fn restore<I, J>(&mut self, digests: I, fingerprints: J)
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = u64>,
    {
        self.digests.extend(digests);
        self.fingerprints.extend(fingerprints);
    }

    /// Digest list (sorted, for stable persistence) and fingerprints in discovery order.
    pub fn snapshot(&self) -> (Vec<String>, Vec<u64>) {
        let mut digests: Vec<String> = self.digests.iter().cloned().collect();
        digests.sort();
        (digests, self.fingerprints.clone())
    }
}
