//! Browser capability surface
//!
//! The crawler only ever talks to these two traits. `cdp_browser` backs them
//! with Chrome over CDP; tests back them with scripted in-memory pages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::events::PageEvent;

/// Opaque page identity, stable for the page's lifetime
pub type PageId = String;

/// Lifecycle event that ends a navigation wait
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitUntil {
    #[default]
    DomContentLoaded,
    Load,
}

impl WaitUntil {
    pub fn matches(&self, event: &PageEvent) -> bool {
        matches!(
            (self, event),
            (WaitUntil::DomContentLoaded, PageEvent::DomContentLoaded)
                | (WaitUntil::Load, PageEvent::Load)
        )
    }
}

/// Options for [`Page::goto`]
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    /// `None` falls back to the page's default timeout
    pub timeout: Option<Duration>,
    pub wait_until: WaitUntil,
    pub referrer: Option<String>,
}

impl NavigateOptions {
    pub fn new(wait_until: WaitUntil) -> Self {
        Self {
            wait_until,
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }
}

/// Browser-reported runtime metrics, keyed by metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics(pub BTreeMap<String, f64>);

impl PageMetrics {
    /// Metrics reported to callers; the browser may send more.
    pub const SUPPORTED: [&'static str; 13] = [
        "Timestamp",
        "Documents",
        "Frames",
        "JSEventListeners",
        "Nodes",
        "LayoutCount",
        "RecalcStyleCount",
        "LayoutDuration",
        "RecalcStyleDuration",
        "ScriptDuration",
        "TaskDuration",
        "JSHeapUsedSize",
        "JSHeapTotalSize",
    ];

    /// Keep only the supported metrics
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self(
            pairs
                .into_iter()
                .filter(|(name, _)| Self::SUPPORTED.contains(&name.as_str()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// JSON object form; non-finite values become `null`
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(name, value)| {
                let value = Number::from_f64(*value).map_or(Value::Null, Value::Number);
                (name.clone(), value)
            })
            .collect();
        Value::Object(map)
    }
}

/// One open page (tab)
#[async_trait]
pub trait Page: Send + Sync + 'static {
    fn id(&self) -> PageId;

    /// Current URL of the main frame
    async fn url(&self) -> Result<String>;

    /// Navigate and wait for `options.wait_until`.
    ///
    /// Fails with `BrowserError::Timeout` if the wait condition is not met in time.
    async fn goto(&self, url: &str, options: NavigateOptions) -> Result<()>;

    /// Timeout used by `goto` when the options carry none
    fn set_default_timeout(&self, timeout: Duration);

    async fn set_cache_enabled(&self, enabled: bool) -> Result<()>;

    /// Evaluate an expression in the page and return its JSON value
    async fn evaluate(&self, expression: &str) -> Result<Value>;

    async fn metrics(&self) -> Result<PageMetrics>;

    /// Events published from now on
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;

    async fn close(&self) -> Result<()>;
}

/// A running browser session
#[async_trait]
pub trait Browser: Send + Sync + 'static {
    type Page: Page;

    async fn new_page(&self) -> Result<Arc<Self::Page>>;

    /// Every page currently open
    async fn pages(&self) -> Result<Vec<Arc<Self::Page>>>;
}
