//! Browser-driven site crawling
//!
//! Two crawls share one browser and one budget:
//!
//! - **Performance**: visit the same URL N times with a fresh page each
//!   time, logging timing, errors and frame navigations per visit.
//! - **Pathfinder**: a random walk of N hops across links that stay on the
//!   seed's registrable domain, never revisiting a URL.
//!
//! ```text
//! DomainScope ─> LinkHarvester ─> PathfinderCrawler ─┐
//!                                 PerformanceCrawler ─┴─> race_deadline ─> ReportSink
//! ```

pub mod config;
pub mod crawl;
pub mod deadline;
pub mod error;
pub mod event_log;
pub mod harvest;
pub mod pathfinder;
pub mod performance;
pub mod scope;
pub mod sink;

pub use config::CrawlConfig;
pub use crawl::{run, CrawlMode};
pub use deadline::{race_deadline, DeadlineOutcome};
pub use error::{CrawlError, Result};
pub use event_log::{LogEntry, VisitLog};
pub use harvest::{CandidateLink, LinkHarvester};
pub use pathfinder::{CrawlState, PathfinderCrawler};
pub use performance::PerformanceCrawler;
pub use scope::DomainScope;
pub use sink::{ChannelSink, ConsoleSink, CrawlReport, ReportSink};
