//! Scripted in-memory browser for driving the crawlers without Chrome

#![allow(dead_code)]

use async_trait::async_trait;
use browser::{
    Browser, BrowserError, EventBus, NavigateOptions, Page, PageEvent, PageId, PageMetrics,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// What the fake web looks like
#[derive(Default)]
pub struct Site {
    /// Page URL -> hrefs its anchors report (as the DOM would resolve them)
    pub links: HashMap<String, Vec<Value>>,
    /// URL -> where it redirects
    pub redirects: HashMap<String, String>,
    /// URLs whose navigation never completes
    pub hanging: HashSet<String>,
    /// URLs whose lifecycle events arrive only after this delay
    pub slow: HashMap<String, Duration>,
    /// URLs whose link extraction throws
    pub broken: HashSet<String>,
    /// URLs whose script throws during load
    pub script_errors: HashMap<String, String>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, hrefs: &[&str]) -> Self {
        self.links
            .insert(url.to_string(), hrefs.iter().map(|h| json!(h)).collect());
        self
    }

    pub fn raw_page(mut self, url: &str, hrefs: Vec<Value>) -> Self {
        self.links.insert(url.to_string(), hrefs);
        self
    }

    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub fn hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    pub fn slow(mut self, url: &str, delay: Duration) -> Self {
        self.slow.insert(url.to_string(), delay);
        self
    }

    pub fn broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    pub fn script_error(mut self, url: &str, message: &str) -> Self {
        self.script_errors
            .insert(url.to_string(), message.to_string());
        self
    }
}

/// A navigation a page was asked to perform
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub page: PageId,
    pub url: String,
    pub referrer: Option<String>,
}

pub struct MockPage {
    id: PageId,
    site: Arc<Site>,
    url: Mutex<String>,
    bus: EventBus,
    closed: AtomicBool,
    cache_enabled: AtomicBool,
    default_timeout: Mutex<Duration>,
    navigations: Arc<Mutex<Vec<Navigation>>>,
}

impl MockPage {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::SeqCst)
    }

    pub fn default_timeout(&self) -> Duration {
        *self.default_timeout.lock().unwrap()
    }

    fn current_url(&self) -> String {
        self.url.lock().unwrap().clone()
    }
}

#[async_trait]
impl Page for MockPage {
    fn id(&self) -> PageId {
        self.id.clone()
    }

    async fn url(&self) -> browser::Result<String> {
        if self.is_closed() {
            return Err(BrowserError::PageClosed);
        }
        Ok(self.current_url())
    }

    async fn goto(&self, url: &str, options: NavigateOptions) -> browser::Result<()> {
        if self.is_closed() {
            return Err(BrowserError::PageClosed);
        }
        self.navigations.lock().unwrap().push(Navigation {
            page: self.id.clone(),
            url: url.to_string(),
            referrer: options.referrer.clone(),
        });

        let timeout = options.timeout.unwrap_or_else(|| self.default_timeout());
        if self.site.hanging.contains(url) {
            tokio::time::sleep(timeout).await;
            return Err(BrowserError::Timeout {
                url: url.to_string(),
                after: timeout,
            });
        }

        let landing = self
            .site
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        *self.url.lock().unwrap() = landing.clone();

        self.bus.publish(PageEvent::FrameNavigated {
            name: String::new(),
            url: landing.clone(),
        });

        if let Some(delay) = self.site.slow.get(url) {
            if *delay >= timeout {
                tokio::time::sleep(timeout).await;
                let bus = self.bus.clone();
                let late = *delay - timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(late).await;
                    bus.publish(PageEvent::DomContentLoaded);
                    bus.publish(PageEvent::Load);
                });
                return Err(BrowserError::Timeout {
                    url: url.to_string(),
                    after: timeout,
                });
            }
            tokio::time::sleep(*delay).await;
        }

        if let Some(message) = self.site.script_errors.get(&landing) {
            self.bus.publish(PageEvent::PageError {
                message: message.clone(),
            });
        }
        self.bus.publish(PageEvent::DomContentLoaded);
        self.bus.publish(PageEvent::Load);
        Ok(())
    }

    fn set_default_timeout(&self, timeout: Duration) {
        *self.default_timeout.lock().unwrap() = timeout;
    }

    async fn set_cache_enabled(&self, enabled: bool) -> browser::Result<()> {
        self.cache_enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    async fn evaluate(&self, _expression: &str) -> browser::Result<Value> {
        if self.is_closed() {
            return Err(BrowserError::PageClosed);
        }
        let url = self.current_url();
        if self.site.broken.contains(&url) {
            return Err(BrowserError::Script("document is not defined".to_string()));
        }
        Ok(Value::Array(
            self.site.links.get(&url).cloned().unwrap_or_default(),
        ))
    }

    async fn metrics(&self) -> browser::Result<PageMetrics> {
        if self.is_closed() {
            return Err(BrowserError::PageClosed);
        }
        Ok(PageMetrics::from_pairs(vec![
            ("Documents".to_string(), 1.0),
            ("Nodes".to_string(), 120.0),
            ("JSHeapUsedSize".to_string(), 1_048_576.0),
        ]))
    }

    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.bus.subscribe()
    }

    async fn close(&self) -> browser::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockBrowser {
    site: Arc<Site>,
    pages: Mutex<Vec<Arc<MockPage>>>,
    next_id: AtomicUsize,
    navigations: Arc<Mutex<Vec<Navigation>>>,
}

impl MockBrowser {
    pub fn new(site: Site) -> Arc<Self> {
        Arc::new(Self {
            site: Arc::new(site),
            pages: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            navigations: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Every page ever opened, closed ones included
    pub fn all_pages(&self) -> Vec<Arc<MockPage>> {
        self.pages.lock().unwrap().clone()
    }

    pub fn open_pages(&self) -> Vec<Arc<MockPage>> {
        self.all_pages()
            .into_iter()
            .filter(|p| !p.is_closed())
            .collect()
    }

    pub fn navigations(&self) -> Vec<Navigation> {
        self.navigations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Browser for MockBrowser {
    type Page = MockPage;

    async fn new_page(&self) -> browser::Result<Arc<MockPage>> {
        let id = format!("page-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let page = Arc::new(MockPage {
            id,
            site: self.site.clone(),
            url: Mutex::new("about:blank".to_string()),
            bus: EventBus::new(),
            closed: AtomicBool::new(false),
            cache_enabled: AtomicBool::new(true),
            default_timeout: Mutex::new(Duration::from_secs(30)),
            navigations: self.navigations.clone(),
        });
        self.pages.lock().unwrap().push(page.clone());
        Ok(page)
    }

    async fn pages(&self) -> browser::Result<Vec<Arc<MockPage>>> {
        Ok(self.open_pages())
    }
}
