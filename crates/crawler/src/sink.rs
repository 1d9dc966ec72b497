//! Where finished crawls are delivered

use serde::{Deserialize, Serialize};
use std::io::Write;
use tokio::sync::oneshot;

use crate::event_log::VisitLog;

/// The result of one successful crawl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CrawlReport {
    /// Seed landing URL followed by one URL per hop
    Path(Vec<String>),
    /// One log per visit, in visit order
    Performance(Vec<VisitLog>),
}

/// Receives a crawl's report, once, after the crawl succeeded
pub trait ReportSink {
    fn deliver(&mut self, report: CrawlReport);
}

impl<F> ReportSink for F
where
    F: FnMut(CrawlReport),
{
    fn deliver(&mut self, report: CrawlReport) {
        self(report)
    }
}

/// Prints reports as plain lines on stdout
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }

    /// Render a report the way `deliver` prints it
    pub fn render(report: &CrawlReport, out: &mut impl Write) -> std::io::Result<()> {
        match report {
            CrawlReport::Path(urls) => {
                for (hop, url) in urls.iter().enumerate() {
                    writeln!(out, "{} {}", hop, url)?;
                }
            }
            CrawlReport::Performance(visits) => {
                for (visit, log) in visits.iter().enumerate() {
                    for entry in &log.entries {
                        let delta = entry
                            .delta
                            .map_or_else(|| "NaN".to_string(), |d| d.to_string());
                        let args = serde_json::to_string(&entry.args)
                            .unwrap_or_else(|_| "[]".to_string());
                        writeln!(
                            out,
                            "{} {} {} {} {}",
                            visit, entry.timestamp, delta, entry.event, args
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl ReportSink for ConsoleSink {
    fn deliver(&mut self, report: CrawlReport) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = Self::render(&report, &mut out).and_then(|_| out.flush()) {
            tracing::error!("Failed to print crawl report: {}", e);
        }
    }
}

/// Hands the report to whoever holds the receiver
pub struct ChannelSink {
    tx: Option<oneshot::Sender<CrawlReport>>,
}

impl ChannelSink {
    pub fn new() -> (Self, oneshot::Receiver<CrawlReport>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }
}

impl ReportSink for ChannelSink {
    fn deliver(&mut self, report: CrawlReport) {
        match self.tx.take() {
            Some(tx) => {
                if tx.send(report).is_err() {
                    tracing::debug!("Report receiver dropped before delivery");
                }
            }
            None => tracing::warn!("Report already delivered, dropping a second one"),
        }
    }
}
