//! Link harvesting across every open page

use browser::{Browser, BrowserError, Page};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::error::{CrawlError, Result};
use crate::scope::DomainScope;

/// Resolved `href` of every anchor that has one. The DOM resolves relative
/// references against the document base for us.
pub const ANCHOR_HREFS: &str =
    "Array.from(document.querySelectorAll('a[href]'), (a) => a.href)";

/// A same-site link and the page it was found on
pub struct CandidateLink<P> {
    pub url: String,
    pub origin: Arc<P>,
}

impl<P> Clone for CandidateLink<P> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            origin: self.origin.clone(),
        }
    }
}

impl<P> std::fmt::Debug for CandidateLink<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateLink").field("url", &self.url).finish()
    }
}

/// Scans live pages for in-scope links. Stateless: every call rescans.
pub struct LinkHarvester<'a, B> {
    browser: &'a B,
    scope: DomainScope,
}

impl<'a, B: Browser> LinkHarvester<'a, B> {
    pub fn new(browser: &'a B, scope: DomainScope) -> Self {
        Self { browser, scope }
    }

    /// Collect candidates from every open page.
    ///
    /// Only listing the pages can fail; a page that cannot be read is
    /// logged and skipped.
    pub async fn harvest(&self) -> Result<Vec<CandidateLink<B::Page>>> {
        let pages = self.browser.pages().await?;
        let mut candidates = Vec::new();

        for page in pages {
            match self.scan_page(&page).await {
                Ok(links) => {
                    tracing::debug!("Page {} offered {} links", page.id(), links.len());
                    candidates.extend(links);
                }
                Err(e) => tracing::warn!("Skipping page {}: {}", page.id(), e),
            }
        }

        Ok(candidates)
    }

    async fn scan_page(&self, page: &Arc<B::Page>) -> Result<Vec<CandidateLink<B::Page>>> {
        let page_url = page.url().await.map_err(CrawlError::PageRead)?;
        let page_url = Url::parse(&page_url).map_err(|e| CrawlError::Scope {
            url: page_url.clone(),
            reason: e.to_string(),
        })?;

        let hrefs = match page.evaluate(ANCHOR_HREFS).await.map_err(CrawlError::PageRead)? {
            Value::Array(hrefs) => hrefs,
            other => {
                return Err(CrawlError::PageRead(BrowserError::Script(format!(
                    "expected a list of hrefs, got {}",
                    other
                ))))
            }
        };

        let mut links = Vec::new();
        for href in &hrefs {
            match self.resolve(&page_url, href) {
                Ok(Some(url)) => links.push(CandidateLink {
                    url: url.to_string(),
                    origin: page.clone(),
                }),
                Ok(None) => tracing::trace!("Out of scope: {}", href),
                Err(e) => tracing::debug!("{}", e),
            }
        }

        Ok(links)
    }

    /// Normalize one href against its page; `None` when out of scope
    fn resolve(&self, page_url: &Url, href: &Value) -> Result<Option<Url>> {
        let raw = href.as_str().ok_or_else(|| CrawlError::Scope {
            url: href.to_string(),
            reason: "href is not a string".to_string(),
        })?;

        let url = page_url.join(raw).map_err(|e| CrawlError::Scope {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        Ok(self.scope.is_in_scope(page_url, &url).then_some(url))
    }
}
