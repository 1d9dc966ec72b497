//! Performance crawler - repeated timed visits to one URL
//!
//! Each visit: instrument the page, start navigating, loiter until the page
//! reports "navigation complete" or the loiter timeout fires, snapshot the
//! runtime metrics, then swap in a fresh page while cooling down.
//!
//! Page events reach the crawler as messages on the receiver returned by
//! `Page::subscribe`, drained in arrival order while the crawler waits.
//! Every visit subscribes anew and drops its receiver at rotation, so late
//! events from an abandoned navigation cannot leak into the next visit.

use browser::{Browser, NavigateOptions, Page, PageEvent, WaitUntil};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::config::CrawlConfig;
use crate::error::Result;
use crate::event_log::{Clock, EventLog, VisitLog};

/// Log name and arguments recorded for a page event
pub fn describe(event: &PageEvent) -> (&'static str, Vec<Value>) {
    match event {
        PageEvent::DomContentLoaded => ("domContentLoaded", vec![]),
        PageEvent::Load => ("load", vec![]),
        PageEvent::PageError { message } => ("pageError", vec![json!(message)]),
        PageEvent::FrameNavigated { name, url } => {
            ("frameNavigated", vec![json!({ "name": name, "url": url })])
        }
    }
}

/// Owns the event log and stamps entries as they arrive
struct VisitRecorder {
    clock: Clock,
    log: EventLog,
}

impl VisitRecorder {
    fn record(&mut self, event: impl Into<String>, args: Vec<Value>) {
        let now = self.clock.now_ms();
        self.log.record(now, event, args);
    }

    fn record_event(&mut self, event: &PageEvent) {
        let (name, args) = describe(event);
        self.record(name, args);
    }

    /// Record whatever is already queued; returns whether `until` was among it
    fn flush(
        &mut self,
        events: &mut broadcast::Receiver<PageEvent>,
        until: Option<WaitUntil>,
    ) -> bool {
        let mut matched = false;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    self.record_event(&event);
                    matched |= until.is_some_and(|until| until.matches(&event));
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log lagged, {} page events dropped", skipped);
                }
                Err(_) => return matched,
            }
        }
    }

    /// Await `fut`, recording page events that arrive meanwhile
    async fn drain_while<F: Future>(
        &mut self,
        events: &mut broadcast::Receiver<PageEvent>,
        fut: F,
    ) -> F::Output {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                output = &mut fut => {
                    self.flush(events, None);
                    return output;
                }
                received = events.recv() => match received {
                    Ok(event) => self.record_event(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event log lagged, {} page events dropped", skipped);
                    }
                    Err(RecvError::Closed) => return fut.await,
                },
            }
        }
    }

    /// Record events until `until` fires or `timeout` elapses.
    /// Returns whether the page completed in time.
    async fn loiter(
        &mut self,
        events: &mut broadcast::Receiver<PageEvent>,
        until: WaitUntil,
        timeout: std::time::Duration,
    ) -> bool {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => return self.flush(events, Some(until)),
                received = events.recv() => match received {
                    Ok(event) => {
                        self.record_event(&event);
                        if until.matches(&event) {
                            return true;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Event log lagged, {} page events dropped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        (&mut deadline).await;
                        return false;
                    }
                },
            }
        }
    }
}

pub struct PerformanceCrawler<B: Browser> {
    browser: Arc<B>,
    config: CrawlConfig,
    recorder: VisitRecorder,
}

impl<B: Browser> PerformanceCrawler<B> {
    pub fn new(browser: Arc<B>, config: CrawlConfig) -> Self {
        Self {
            browser,
            config,
            recorder: VisitRecorder {
                clock: Clock::new(),
                log: EventLog::new(),
            },
        }
    }

    /// Visit `target_url` `config.count` times; one log per visit
    pub async fn crawl(mut self, target_url: &str) -> Result<Vec<VisitLog>> {
        let mut page = self.browser.new_page().await?;

        for visit in 0..self.config.count {
            self.recorder.record(format!("starting visit {}", visit), vec![]);
            let mut events = self.instrument(&page).await?;

            self.recorder.record(format!("navigating to {}", target_url), vec![]);
            self.start_navigation(&page, target_url);

            self.recorder.record("waiting for load/timeout", vec![]);
            let completed = self
                .recorder
                .loiter(
                    &mut events,
                    self.config.navigation_complete,
                    self.config.loiter_timeout,
                )
                .await;
            if !completed {
                tracing::info!("Visit {} loitered out before navigation completed", visit);
            }

            let metrics = self.recorder.drain_while(&mut events, page.metrics()).await?;
            self.recorder.record(
                "capturing page metrics post-load/loiter",
                vec![metrics.to_value()],
            );

            self.recorder
                .record("cooling down/rotating logs/pages for next visit", vec![]);
            let browser = &self.browser;
            let cooldown = self.config.cooldown;
            let (fresh, closed, ()) = self
                .recorder
                .drain_while(&mut events, async {
                    tokio::join!(
                        browser.new_page(),
                        page.close(),
                        tokio::time::sleep(cooldown)
                    )
                })
                .await;
            closed?;
            page = fresh?;

            drop(events);
            self.recorder.log.rotate();
            tracing::info!("Visit {}/{} done", visit + 1, self.config.count);
        }

        Ok(self.recorder.log.into_visits())
    }

    /// Timeouts, cache and a fresh event subscription for this visit
    async fn instrument(
        &self,
        page: &Arc<B::Page>,
    ) -> Result<broadcast::Receiver<PageEvent>> {
        page.set_default_timeout(self.config.nav_timeout);
        let events = page.subscribe();
        page.set_cache_enabled(false).await?;
        Ok(events)
    }

    /// Fire and forget; the loiter decides how long we care
    fn start_navigation(&self, page: &Arc<B::Page>, target_url: &str) {
        let page = page.clone();
        let url = target_url.to_string();
        let options = NavigateOptions::new(self.config.navigation_complete);

        tokio::spawn(async move {
            if let Err(e) = page.goto(&url, options).await {
                tracing::debug!("Background navigation to {} ended: {}", url, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_events() {
        assert_eq!(describe(&PageEvent::DomContentLoaded), ("domContentLoaded", vec![]));
        assert_eq!(describe(&PageEvent::Load), ("load", vec![]));
        assert_eq!(
            describe(&PageEvent::PageError {
                message: "ReferenceError: foo".to_string()
            }),
            ("pageError", vec![json!("ReferenceError: foo")])
        );
        assert_eq!(
            describe(&PageEvent::FrameNavigated {
                name: "ad".to_string(),
                url: "https://ads.example/".to_string()
            }),
            (
                "frameNavigated",
                vec![json!({ "name": "ad", "url": "https://ads.example/" })]
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_loiter_stops_on_completion_event() {
        let mut recorder = VisitRecorder {
            clock: Clock::new(),
            log: EventLog::new(),
        };
        let (tx, mut rx) = broadcast::channel(16);
        tx.send(PageEvent::Load).unwrap();
        tx.send(PageEvent::DomContentLoaded).unwrap();
        tx.send(PageEvent::Load).unwrap();

        let completed = recorder
            .loiter(&mut rx, WaitUntil::DomContentLoaded, std::time::Duration::from_secs(30))
            .await;

        assert!(completed);
        assert_eq!(recorder.log.current_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loiter_times_out() {
        let mut recorder = VisitRecorder {
            clock: Clock::new(),
            log: EventLog::new(),
        };
        let (_tx, mut rx) = broadcast::channel::<PageEvent>(16);
        let started = tokio::time::Instant::now();

        let completed = recorder
            .loiter(&mut rx, WaitUntil::DomContentLoaded, std::time::Duration::from_secs(30))
            .await;

        assert!(!completed);
        assert_eq!(started.elapsed(), std::time::Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loiter_deadline_holds_under_steady_event_stream() {
        let mut recorder = VisitRecorder {
            clock: Clock::new(),
            log: EventLog::new(),
        };
        let (tx, mut rx) = broadcast::channel(1024);
        let chatter = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(std::time::Duration::from_millis(100));
            loop {
                ticks.tick().await;
                let frame = PageEvent::FrameNavigated {
                    name: "ad".to_string(),
                    url: "https://ads.example/".to_string(),
                };
                if tx.send(frame).is_err() {
                    break;
                }
            }
        });
        let started = tokio::time::Instant::now();

        let completed = recorder
            .loiter(&mut rx, WaitUntil::Load, std::time::Duration::from_secs(5))
            .await;
        chatter.abort();

        assert!(!completed);
        assert_eq!(started.elapsed(), std::time::Duration::from_secs(5));
        assert!(recorder.log.current_len() >= 50);
    }

    #[tokio::test]
    async fn test_loiter_with_zero_timeout_keeps_queued_events() {
        let mut recorder = VisitRecorder {
            clock: Clock::new(),
            log: EventLog::new(),
        };
        let (tx, mut rx) = broadcast::channel(16);
        for _ in 0..3 {
            tx.send(PageEvent::Load).unwrap();
        }
        tx.send(PageEvent::DomContentLoaded).unwrap();

        let completed = recorder
            .loiter(&mut rx, WaitUntil::DomContentLoaded, std::time::Duration::ZERO)
            .await;

        assert!(completed);
        assert_eq!(recorder.log.current_len(), 4);
    }

    #[tokio::test]
    async fn test_drain_while_records_events_before_output() {
        let mut recorder = VisitRecorder {
            clock: Clock::new(),
            log: EventLog::new(),
        };
        let (tx, mut rx) = broadcast::channel(16);
        tx.send(PageEvent::Load).unwrap();

        let output = recorder.drain_while(&mut rx, async { 7 }).await;

        assert_eq!(output, 7);
        assert_eq!(recorder.log.current_len(), 1);
    }
}
