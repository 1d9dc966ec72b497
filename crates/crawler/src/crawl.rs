//! Orchestration: pick a crawler, bound it by the global budget, deliver

use browser::Browser;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::CrawlConfig;
use crate::deadline::{race_deadline, DeadlineOutcome};
use crate::error::{CrawlError, Result};
use crate::pathfinder::PathfinderCrawler;
use crate::performance::PerformanceCrawler;
use crate::sink::{CrawlReport, ReportSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlMode {
    /// Repeated timed visits to the target
    Performance,
    /// Random same-site walk from the target
    Pathfinder,
}

/// Run one crawl of `target` under `config.max_crawl_time`.
///
/// The sink hears about the crawl only if it succeeds within the budget.
/// When the budget runs out the crawl is abandoned and the outcome is
/// still `Ok`, since bounding total runtime is the point of the budget.
/// An abandoned crawl may keep running in the background, but its report
/// is dropped.
pub async fn run<B, S>(
    browser: Arc<B>,
    mode: CrawlMode,
    target: String,
    config: CrawlConfig,
    mut sink: S,
) -> Result<DeadlineOutcome<()>>
where
    B: Browser,
    S: ReportSink,
{
    let budget = config.max_crawl_time;
    tracing::info!("Starting {:?} crawl of {} (budget {:?})", mode, target, budget);

    let crawl = async move {
        let report = match mode {
            CrawlMode::Performance => CrawlReport::Performance(
                PerformanceCrawler::new(browser, config).crawl(&target).await?,
            ),
            CrawlMode::Pathfinder => {
                CrawlReport::Path(PathfinderCrawler::new(browser, config).crawl(&target).await?)
            }
        };
        Ok::<CrawlReport, CrawlError>(report)
    };

    match race_deadline(budget, crawl).await? {
        DeadlineOutcome::Finished(result) => {
            sink.deliver(result?);
            Ok(DeadlineOutcome::Finished(()))
        }
        DeadlineOutcome::Abandoned { budget } => Ok(DeadlineOutcome::Abandoned { budget }),
    }
}
