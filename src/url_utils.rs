//! URL utilities: normalization, stable hashing and the crawl allow-list policy.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use url::Url;

/// Path segments containing any of these words are treated as calendar traps.
const TRAP_WORDS: &[&str] = &["month", "day", "year", "week"];

/// Query keys containing any of these words are skipped.
const TRAP_QUERY_KEYS: &[&str] = &["date", "ical", "share"];

const DISALLOWED_EXTENSIONS: &[&str] = &[
    "css", "js", "bmp", "gif", "jpg", "jpeg", "ico", "png", "tif", "tiff", "mid", "mp2", "mp3",
    "mp4", "wav", "avi", "mov", "mpeg", "ram", "m4v", "mkv", "ogg", "ogv", "pdf", "ps", "eps",
    "tex", "ppt", "pptx", "doc", "docx", "xls", "xlsx", "names", "data", "dat", "exe", "bz2",
    "tar", "msi", "bin", "7z", "psd", "dmg", "iso", "epub", "dll", "cnf", "tgz", "sha1", "thmx",
    "mso", "arff", "rtf", "jar", "csv", "rm", "smil", "wmv", "swf", "wma", "zip", "rar", "gz",
];

pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Canonical form used for dedup keys: fragment removed, scheme and host lower-cased,
/// trailing slashes stripped.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let serialized = match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => trimmed.split('#').next().unwrap_or_default().to_string(),
    };
    serialized.trim_end_matches('/').to_string()
}

/// Stable key for a normalized URL. The scheme is excluded so http and https variants collide.
pub fn url_hash(normalized: &str) -> String {
    let key = normalized
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(normalized);
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

pub fn convert_to_absolute_url(link: &str, base_url: &str) -> Result<String, String> {
    let base = Url::parse(base_url).map_err(|e| e.to_string())?;
    let absolute_url = base.join(link).map_err(|e| e.to_string())?;
    Ok(absolute_url.to_string())
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.starts_with("text/html") || lower.starts_with("application/xhtml+xml")
}

/// Decides which URLs belong to the crawl.
pub trait UrlPolicy: Send + Sync {
    fn is_allowed(&self, url: &str) -> bool;

    fn normalize(&self, url: &str) -> String {
        normalize_url(url)
    }

    fn hash(&self, normalized: &str) -> String {
        url_hash(normalized)
    }
}

/// Allow-list of host suffixes plus trap and file-type heuristics.
#[derive(Debug, Clone)]
pub struct DomainPolicy {
    allowed_domains: Vec<String>,
}

impl DomainPolicy {
    pub fn new<I, S>(allowed_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.into().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn host_allowed(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.allowed_domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    }
}

fn date_segment() -> &'static Regex {
    static DATE: OnceLock<Regex> = OnceLock::new();
    DATE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})(?:-(\d{2}))?").expect("valid date regex"))
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// True when the segment starts with a real `YYYY-MM` or `YYYY-MM-DD` date.
fn starts_with_date(segment: &str) -> bool {
    let Some(caps) = date_segment().captures(segment) else {
        return false;
    };
    let year: u32 = caps[1].parse().unwrap_or(0);
    let month: u32 = caps[2].parse().unwrap_or(0);
    if year == 0 || !(1..=12).contains(&month) {
        return false;
    }
    match caps.get(3) {
        Some(day) => {
            let day: u32 = day.as_str().parse().unwrap_or(0);
            (1..=days_in_month(year, month)).contains(&day)
        }
        None => true,
    }
}

fn is_trap_path(path: &str) -> bool {
    path.to_ascii_lowercase().split('/').any(|segment| {
        TRAP_WORDS.iter().any(|word| segment.contains(word)) || starts_with_date(segment)
    })
}

fn has_disallowed_extension(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    match lower.rsplit_once('.') {
        Some((_, ext)) => DISALLOWED_EXTENSIONS.contains(&ext),
        None => false,
    }
}

fn is_trap_query(query: &str) -> bool {
    query.to_ascii_lowercase().split('&').any(|pair| match pair.split_once('=') {
        Some((key, _)) => TRAP_QUERY_KEYS.iter().any(|word| key.contains(word)),
        None => false,
    })
}

impl UrlPolicy for DomainPolicy {
    fn is_allowed(&self, url: &str) -> bool {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(_) => return false,
        };

        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }

        match parsed.host_str() {
            Some(host) if self.host_allowed(host) => {}
            _ => return false,
        }

        let path = parsed.path();
        if is_trap_path(path) || has_disallowed_extension(path) {
            return false;
        }

        !parsed.query().map(is_trap_query).unwrap_or(false)
    }
}
