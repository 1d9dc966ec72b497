//! CDP-backed page
//!
//! Each page owns a pump task that turns raw CDP events of its session into
//! `PageEvent`s on the page's own bus.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::capability::{NavigateOptions, Page, PageId, PageMetrics, WaitUntil};
use crate::cdp::protocol::{CDPEvent, GetMetricsResult};
use crate::cdp::CDPSession;
use crate::error::{BrowserError, Result};
use crate::events::{EventBus, PageEvent};

pub struct CdpPage {
    session: CDPSession,
    bus: EventBus,
    default_timeout_ms: AtomicU64,
    closed: AtomicBool,
    pump: JoinHandle<()>,
}

impl CdpPage {
    pub fn new(session: CDPSession, default_timeout: Duration) -> Self {
        let bus = EventBus::new();
        let pump = tokio::spawn(pump_events(session.events(), bus.clone()));

        Self {
            session,
            bus,
            default_timeout_ms: AtomicU64::new(duration_ms(default_timeout)),
            closed: AtomicBool::new(false),
            pump,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms.load(Ordering::SeqCst))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(BrowserError::PageClosed);
        }
        Ok(())
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[async_trait]
impl Page for CdpPage {
    fn id(&self) -> PageId {
        self.session.target_id.clone()
    }

    async fn url(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.session.get_target_info().await?.url)
    }

    async fn goto(&self, url: &str, options: NavigateOptions) -> Result<()> {
        self.ensure_open()?;
        let timeout = options.timeout.unwrap_or_else(|| self.default_timeout());

        // Subscribe first so the lifecycle event cannot slip past us
        let mut events = self.session.events();
        let wait_until = options.wait_until;

        let navigation = async {
            let result = self
                .session
                .navigate(url, options.referrer.as_deref())
                .await?;

            if let Some(reason) = result.error_text {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    reason,
                });
            }

            // Same-document navigations have no loader and fire no lifecycle
            let Some(loader_id) = result.loader_id else {
                return Ok(());
            };

            loop {
                match events.recv().await {
                    Ok(event) if completes(&event, &loader_id, wait_until) => return Ok(()),
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return Err(BrowserError::PageClosed),
                }
            }
        };

        tokio::time::timeout(timeout, navigation)
            .await
            .map_err(|_| BrowserError::Timeout {
                url: url.to_string(),
                after: timeout,
            })?
    }

    fn set_default_timeout(&self, timeout: Duration) {
        self.default_timeout_ms
            .store(duration_ms(timeout), Ordering::SeqCst);
    }

    async fn set_cache_enabled(&self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        self.session
            .send(
                "Network.setCacheDisabled",
                Some(json!({ "cacheDisabled": !enabled })),
            )
            .await?;
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value> {
        self.ensure_open()?;
        let result = self.session.evaluate(expression).await?;

        if let Some(details) = result.get("exceptionDetails") {
            return Err(BrowserError::Script(exception_message(details)));
        }

        Ok(result["result"]["value"].clone())
    }

    async fn metrics(&self) -> Result<PageMetrics> {
        self.ensure_open()?;
        let result = self.session.send("Performance.getMetrics", None).await?;
        let parsed: GetMetricsResult = serde_json::from_value(result)?;

        Ok(PageMetrics::from_pairs(
            parsed.metrics.into_iter().map(|m| (m.name, m.value)),
        ))
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.bus.subscribe()
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!("Closing page {}", self.session.target_id);
        self.session.close().await?;
        Ok(())
    }
}

async fn pump_events(mut rx: broadcast::Receiver<CDPEvent>, bus: EventBus) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Some(page_event) = translate(&event) {
                    bus.publish(page_event);
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Page event pump lagged, {} CDP events dropped", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Map a raw CDP event to the page event it stands for, if any
pub(crate) fn translate(event: &CDPEvent) -> Option<PageEvent> {
    let params = event.params.as_ref().unwrap_or(&Value::Null);

    match event.method.as_str() {
        "Page.domContentEventFired" => Some(PageEvent::DomContentLoaded),
        "Page.loadEventFired" => Some(PageEvent::Load),
        "Runtime.exceptionThrown" => Some(PageEvent::PageError {
            message: exception_message(&params["exceptionDetails"]),
        }),
        "Page.frameNavigated" => {
            let frame = &params["frame"];
            Some(PageEvent::FrameNavigated {
                name: frame["name"].as_str().unwrap_or_default().to_string(),
                url: frame["url"].as_str().unwrap_or_default().to_string(),
            })
        }
        _ => None,
    }
}

/// Name of the `Page.lifecycleEvent` that satisfies `wait_until`
fn lifecycle_name(wait_until: WaitUntil) -> &'static str {
    match wait_until {
        WaitUntil::DomContentLoaded => "DOMContentLoaded",
        WaitUntil::Load => "load",
    }
}

/// Whether `event` completes the navigation started under `loader_id`.
///
/// Lifecycle events of an earlier document carry an older loader id and
/// never match.
pub(crate) fn completes(event: &CDPEvent, loader_id: &str, wait_until: WaitUntil) -> bool {
    if event.method != "Page.lifecycleEvent" {
        return false;
    }
    let Some(params) = event.params.as_ref() else {
        return false;
    };

    params["loaderId"].as_str() == Some(loader_id)
        && params["name"].as_str() == Some(lifecycle_name(wait_until))
}

fn exception_message(details: &Value) -> String {
    details["exception"]["description"]
        .as_str()
        .or_else(|| details["text"].as_str())
        .unwrap_or("Uncaught exception")
        .to_string()
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(method: &str, params: Value) -> CDPEvent {
        CDPEvent {
            method: method.to_string(),
            params: Some(params),
            session_id: Some("S1".to_string()),
        }
    }

    #[test]
    fn test_translate_lifecycle_events() {
        assert_eq!(
            translate(&event("Page.domContentEventFired", json!({ "timestamp": 1.0 }))),
            Some(PageEvent::DomContentLoaded)
        );
        assert_eq!(
            translate(&event("Page.loadEventFired", json!({ "timestamp": 2.0 }))),
            Some(PageEvent::Load)
        );
        assert_eq!(
            translate(&event("Network.requestWillBeSent", json!({}))),
            None
        );
    }

    fn lifecycle(name: &str, loader_id: &str) -> CDPEvent {
        event(
            "Page.lifecycleEvent",
            json!({ "frameId": "F1", "loaderId": loader_id, "name": name, "timestamp": 3.0 }),
        )
    }

    #[test]
    fn test_completes_only_for_own_loader() {
        // The previous document's load lands after the new navigation began
        let stale = lifecycle("load", "L1");
        let own = lifecycle("load", "L2");

        assert!(!completes(&stale, "L2", WaitUntil::Load));
        assert!(completes(&own, "L2", WaitUntil::Load));
    }

    #[test]
    fn test_completes_matches_wait_until() {
        let dom_ready = lifecycle("DOMContentLoaded", "L2");

        assert!(completes(&dom_ready, "L2", WaitUntil::DomContentLoaded));
        assert!(!completes(&dom_ready, "L2", WaitUntil::Load));
        assert!(!completes(&lifecycle("firstPaint", "L2"), "L2", WaitUntil::Load));
    }

    #[test]
    fn test_completes_ignores_legacy_load_events() {
        let legacy = event("Page.loadEventFired", json!({ "timestamp": 2.0 }));
        assert!(!completes(&legacy, "L2", WaitUntil::Load));
    }

    #[test]
    fn test_translate_frame_navigated() {
        let translated = translate(&event(
            "Page.frameNavigated",
            json!({ "frame": { "id": "F1", "url": "https://example.com/" } }),
        ));

        assert_eq!(
            translated,
            Some(PageEvent::FrameNavigated {
                name: String::new(),
                url: "https://example.com/".to_string(),
            })
        );
    }

    #[test]
    fn test_translate_exception_prefers_description() {
        let translated = translate(&event(
            "Runtime.exceptionThrown",
            json!({
                "exceptionDetails": {
                    "text": "Uncaught",
                    "exception": { "description": "TypeError: x is undefined" }
                }
            }),
        ));

        assert_eq!(
            translated,
            Some(PageEvent::PageError {
                message: "TypeError: x is undefined".to_string(),
            })
        );

        let bare = translate(&event(
            "Runtime.exceptionThrown",
            json!({ "exceptionDetails": { "text": "Uncaught SyntaxError" } }),
        ));
        assert_eq!(
            bare,
            Some(PageEvent::PageError {
                message: "Uncaught SyntaxError".to_string(),
            })
        );
    }
}
