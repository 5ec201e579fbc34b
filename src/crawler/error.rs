//! Error types for the crawler module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// robots.txt denies the URL for our user agent
    #[error("Disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),

    /// The server answered 404
    #[error("HTTP 404 Not Found: {0}")]
    NotFound(String),

    /// Timeout, connection failure, 5xx or 429
    #[error("Transient network error: {0}")]
    Transient(String),

    /// Non-retryable HTTP status (4xx other than 404)
    #[error("HTTP {status} for {url}")]
    Fatal {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Render engine unavailable or timed out
    #[error("Render fallback failed: {0}")]
    RenderFailed(String),

    /// HTML parsing error
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// Feed or sitemap XML could not be read
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl CrawlError {
    /// Whether the failed network call is worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, CrawlError::Transient(_))
    }

    /// Classify a reqwest failure that happened before a status was available
    pub(crate) fn from_request(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            CrawlError::Transient(format!("{url}: {err}"))
        } else {
            CrawlError::Other(format!("{url}: {err}"))
        }
    }

    /// Classify a non-success HTTP status
    pub(crate) fn from_status(url: &str, status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::NOT_FOUND {
            CrawlError::NotFound(url.to_string())
        } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            CrawlError::Transient(format!("HTTP {} for {}", status.as_u16(), url))
        } else {
            CrawlError::Fatal {
                status: status.as_u16(),
                url: url.to_string(),
            }
        }
    }
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        CrateError::Crawl(err.to_string())
    }
}
