use scraper::{Html, Selector};

use crate::dedup::TokenCounts;
use crate::network::FetchResult;
use crate::tokenizer::{tokenize, word_frequencies};
use crate::url_utils;

/// Links and word counts pulled out of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    pub links: Vec<String>,
    pub tokens: TokenCounts,
}

/// Turns a fetched page into links and a token table.
pub trait Extractor: Send + Sync {
    fn extract(&self, url: &str, page: &FetchResult) -> PageContent;
}

/// Extractor for HTML pages. Anything that is not a successful HTML response yields
/// empty content.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlExtractor;

impl Extractor for HtmlExtractor {
    fn extract(&self, url: &str, page: &FetchResult) -> PageContent {
        if !page.is_success() || !page.is_html() {
            return PageContent::default();
        }

        let body = String::from_utf8_lossy(&page.body);
        let document = Html::parse_document(&body);

        let base = if page.url.is_empty() { url } else { page.url.as_str() };
        let links = extract_links(&document)
            .into_iter()
            .filter_map(|href| url_utils::convert_to_absolute_url(&href, base).ok())
            .map(|absolute| match absolute.split_once('#') {
                Some((head, _)) => head.to_string(),
                None => absolute,
            })
            .collect();

        let text = visible_text(&document);
        PageContent {
            links,
            tokens: word_frequencies(tokenize(&text)),
        }
    }
}

/// Extract all hyperlink URLs from a parsed document
///
/// Skips empty links and non-navigational schemes (javascript, mailto, tel, data, file).
pub fn extract_links(document: &Html) -> Vec<String> {
    let selector = Selector::parse("a[href]").expect("Invalid CSS selector");

    let mut links = Vec::new();

    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            let cleaned_href = href.trim();

            if !cleaned_href.is_empty()
                && !cleaned_href.starts_with("javascript:")
                && !cleaned_href.starts_with("mailto:")
                && !cleaned_href.starts_with("tel:")
                && !cleaned_href.starts_with("data:")
                && !cleaned_href.starts_with("file:")
            {
                links.push(cleaned_href.to_string());
            }
        }
    }

    links
}

/// Text content of the document outside script, style and noscript elements.
pub fn visible_text(document: &Html) -> String {
    let mut text = String::new();
    for node in document.tree.nodes() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|e| matches!(e.name(), "script" | "style" | "noscript"))
                .unwrap_or(false)
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }
    text
}
