//! Pathfinder - a random same-site walk
//!
//! ```text
//! SEEDING ──> WALKING ──(count hops)──> DONE
//!                │
//!                └──(no unseen link left)──> EXHAUSTED
//! ```

use browser::{Browser, NavigateOptions, Page};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::CrawlConfig;
use crate::error::{CrawlError, Result};
use crate::harvest::{CandidateLink, LinkHarvester};
use crate::scope::DomainScope;

/// Visited URLs plus the pool of links not yet picked
pub struct CrawlState<P> {
    visited: HashSet<String>,
    pool: Vec<CandidateLink<P>>,
}

impl<P> CrawlState<P> {
    pub fn new() -> Self {
        Self {
            visited: HashSet::new(),
            pool: Vec::new(),
        }
    }

    pub fn mark_visited(&mut self, url: impl Into<String>) {
        self.visited.insert(url.into());
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn extend_pool(&mut self, links: impl IntoIterator<Item = CandidateLink<P>>) {
        self.pool.extend(links);
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Remove random pool entries until one has not been visited yet.
    ///
    /// Seen entries drawn along the way are gone for good.
    pub fn take_unseen<R: Rng>(&mut self, rng: &mut R) -> Option<CandidateLink<P>> {
        while !self.pool.is_empty() {
            let index = rng.gen_range(0..self.pool.len());
            let candidate = self.pool.swap_remove(index);
            if !self.visited.contains(&candidate.url) {
                return Some(candidate);
            }
            tracing::trace!("Discarding already visited {}", candidate.url);
        }
        None
    }
}

impl<P> Default for CrawlState<P> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PathfinderCrawler<B: Browser> {
    browser: Arc<B>,
    config: CrawlConfig,
    scope: DomainScope,
    rng: StdRng,
}

impl<B: Browser> PathfinderCrawler<B> {
    pub fn new(browser: Arc<B>, config: CrawlConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            browser,
            config,
            scope: DomainScope::new(),
            rng,
        }
    }

    /// Walk `config.count` hops away from `seed_url`.
    ///
    /// Returns the landing URL of the seed followed by one URL per hop.
    pub async fn crawl(mut self, seed_url: &str) -> Result<Vec<String>> {
        let mut state = CrawlState::new();

        let page = self.browser.new_page().await?;
        page.goto(seed_url, self.navigate_options()).await?;
        let landing = page.url().await?;
        tracing::info!("Seeded walk at {} (landed on {})", seed_url, landing);

        state.mark_visited(seed_url);
        state.mark_visited(landing.clone());
        let mut path = vec![landing.clone()];
        let mut last_url = landing;

        for hop in 0..self.config.count {
            let harvested = LinkHarvester::new(&*self.browser, self.scope)
                .harvest()
                .await?;
            state.extend_pool(harvested);

            let candidate = state
                .take_unseen(&mut self.rng)
                .ok_or(CrawlError::PoolExhausted {
                    hops_completed: hop,
                })?;

            self.close_all_except(&candidate.origin).await?;

            let options = self.navigate_options().referrer(last_url.clone());
            candidate.origin.goto(&candidate.url, options).await?;
            tracing::info!(
                "Hop {}/{}: {} ({} links pooled)",
                hop + 1,
                self.config.count,
                candidate.url,
                state.pool_len()
            );

            state.mark_visited(candidate.url.clone());
            path.push(candidate.url.clone());
            last_url = candidate.url;
        }

        Ok(path)
    }

    fn navigate_options(&self) -> NavigateOptions {
        NavigateOptions::new(self.config.navigation_complete).timeout(self.config.nav_timeout)
    }

    /// Leave exactly one page open: the one we are about to navigate
    async fn close_all_except(&self, keep: &Arc<B::Page>) -> Result<()> {
        let keep_id = keep.id();
        for page in self.browser.pages().await? {
            if page.id() != keep_id {
                if let Err(e) = page.close().await {
                    tracing::warn!("Failed to close page {}: {}", page.id(), e);
                }
            }
        }
        Ok(())
    }
}
