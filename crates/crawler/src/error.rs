//! Error types for crawling
//!
//! Flat on purpose: `Scope` and `PageRead` are recovered where they happen
//! and only ever logged; the rest end the crawl.

use browser::BrowserError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrawlError>;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Link {url} skipped: {reason}")]
    Scope { url: String, reason: String },

    #[error("Page could not be read: {0}")]
    PageRead(#[source] BrowserError),

    #[error("Navigation to {url} timed out after {after:?}")]
    NavigationTimeout { url: String, after: Duration },

    #[error("Browser error: {0}")]
    Browser(BrowserError),

    #[error("no links left after {hops_completed} hops")]
    PoolExhausted { hops_completed: usize },

    #[error("Crawl task failed: {0}")]
    Task(String),
}

impl From<BrowserError> for CrawlError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Timeout { url, after } => CrawlError::NavigationTimeout { url, after },
            other => CrawlError::Browser(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_timeout_becomes_navigation_timeout() {
        let err: CrawlError = BrowserError::Timeout {
            url: "https://example.com/".to_string(),
            after: Duration::from_secs(30),
        }
        .into();

        assert!(matches!(
            err,
            CrawlError::NavigationTimeout { ref url, .. } if url == "https://example.com/"
        ));
    }

    #[test]
    fn test_pool_exhausted_message() {
        let err = CrawlError::PoolExhausted { hops_completed: 2 };
        assert!(err.to_string().contains("no links left"));
    }
}
