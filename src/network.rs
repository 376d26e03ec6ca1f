use std::io::Read;
use std::time::Duration;

use crate::config::Config;
use crate::url_utils;

/// Anything that can download a page. Implementations never fail outright; problems are
/// reported inside the returned [`FetchResult`].
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> FetchResult;
}

/// Outcome of one download attempt
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Where the response came from, after redirects.
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub error: Option<FetchError>,
}

impl FetchResult {
    pub fn ok(url: impl Into<String>, status_code: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            status_code,
            content_type,
            body,
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, error: FetchError) -> Self {
        Self {
            url: url.into(),
            status_code: 0,
            content_type: None,
            body: Vec::new(),
            error: Some(error),
        }
    }

    /// A 2xx response without a transport error.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(url_utils::is_html_content_type)
            .unwrap_or(false)
    }
}

/// Errors that can occur during HTTP fetching
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection refused - server not accepting connections")]
    ConnectionRefused,

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to read response body: {0}")]
    BodyError(String),

    #[error("Content too large: {0} bytes (max: {1} bytes)")]
    ContentTooLarge(usize, usize),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

/// Blocking HTTP client used by the worker threads
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    max_content_size: usize,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, FetchError> {
        Self::with_content_limit(user_agent, timeout_secs, Config::MAX_CONTENT_SIZE)
    }

    pub fn with_content_limit(
        user_agent: &str,
        timeout_secs: u64,
        max_content_size: usize,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(Config::MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            max_content_size,
        })
    }

    fn fetch_once(&self, url: &str) -> Result<FetchResult, FetchError> {
        let response = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .map_err(Self::classify_error)?;

        // Final URL after redirects; relative links resolve against it.
        let final_url = response.url().to_string();
        let status_code = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        if let Some(length) = response.content_length() {
            if length as usize > self.max_content_size {
                return Err(FetchError::ContentTooLarge(length as usize, self.max_content_size));
            }
        }

        // Read one byte past the limit so oversized bodies without a length header are caught.
        let mut body = Vec::new();
        response
            .take(self.max_content_size as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|e| FetchError::BodyError(e.to_string()))?;
        if body.len() > self.max_content_size {
            return Err(FetchError::ContentTooLarge(body.len(), self.max_content_size));
        }

        Ok(FetchResult::ok(final_url, status_code, content_type, body))
    }

    fn classify_error(error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            return FetchError::Timeout;
        }
        let error_msg = error.to_string().to_lowercase();
        if error_msg.contains("connection refused") {
            return FetchError::ConnectionRefused;
        }
        FetchError::NetworkError(error.to_string())
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> FetchResult {
        match self.fetch_once(url) {
            Ok(result) => result,
            Err(e) => FetchResult::failed(url, e),
        }
    }
}
