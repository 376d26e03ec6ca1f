//! Word tokenization for page text.

use crate::dedup::TokenCounts;

/// Split text into lower-cased runs of ASCII letters and digits.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

pub fn word_frequencies<I>(tokens: I) -> TokenCounts
where
    I: IntoIterator<Item = String>,
{
    let mut counts = TokenCounts::new();
    for token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// Sum of all frequencies in a table.
pub fn total_words(tokens: &TokenCounts) -> u64 {
    tokens.values().sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_non_ascii_alphanumerics() {
        let tokens: Vec<String> = tokenize("Hello, World! It's 2024 -- café_au-lait").collect();
        assert_eq!(
            tokens,
            vec!["hello", "world", "it", "s", "2024", "caf", "au", "lait"]
        );
    }

    #[test]
    fn test_tokenize_empty() {
        assert_eq!(tokenize("  ... \n").count(), 0);
    }

    #[test]
    fn test_word_frequencies() {
        let counts = word_frequencies(tokenize("the cat and THE hat"));
        assert_eq!(counts.get("the"), Some(&2));
        assert_eq!(counts.get("cat"), Some(&1));
        assert_eq!(counts.len(), 4);
        assert_eq!(total_words(&counts), 5);
    }
}
