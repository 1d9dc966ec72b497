//! Crawl configuration

use browser::WaitUntil;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Knobs shared by both crawlers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Hops for the pathfinder, visits for the performance crawler
    pub count: usize,
    /// Bound on a single awaited navigation
    pub nav_timeout: Duration,
    /// How long a performance visit waits for the page before moving on
    pub loiter_timeout: Duration,
    /// Pause between performance visits
    pub cooldown: Duration,
    /// Global budget for the whole crawl
    pub max_crawl_time: Duration,
    /// Lifecycle event that counts as "navigation complete"
    pub navigation_complete: WaitUntil,
    /// Seed for the pathfinder's link choice; random when unset
    pub seed: Option<u64>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            count: 10,
            nav_timeout: Duration::from_secs(30),
            loiter_timeout: Duration::from_secs(30),
            cooldown: Duration::from_secs(3),
            max_crawl_time: Duration::from_secs(180),
            navigation_complete: WaitUntil::DomContentLoaded,
            seed: None,
        }
    }
}
