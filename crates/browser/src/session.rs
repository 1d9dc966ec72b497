//! Browser Session Management
//!
//! `CdpBrowser` is the CDP-backed implementation of [`Browser`]: it creates
//! and tracks pages over one shared `CDPClient`.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::capability::Browser;
use crate::cdp::protocol::{CreateTargetResult, TargetId, TargetInfo};
use crate::cdp::{CDPClient, CDPSession};
use crate::error::Result;
use crate::page::CdpPage;

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Browser-level DevTools WebSocket URL
    pub cdp_url: String,
    /// Navigation timeout given to every new page
    pub default_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cdp_url: "ws://localhost:9222/devtools/browser".to_string(),
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Browser Session - one CDP connection and the pages opened through it
pub struct CdpBrowser {
    client: Arc<CDPClient>,
    pages: DashMap<TargetId, Arc<CdpPage>>,
    default_timeout: Duration,
}

impl CdpBrowser {
    pub fn new(client: Arc<CDPClient>, default_timeout: Duration) -> Self {
        Self {
            client,
            pages: DashMap::new(),
            default_timeout,
        }
    }

    /// Connect to a running browser
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let client = CDPClient::connect(&config.cdp_url).await?;
        tracing::info!("Connected to browser at {}", config.cdp_url);
        Ok(Self::new(client, config.default_timeout))
    }

    async fn attach(&self, target_id: TargetId) -> Result<Arc<CdpPage>> {
        let session = CDPSession::attach(self.client.clone(), target_id.clone(), None).await?;
        let page = Arc::new(CdpPage::new(session, self.default_timeout));
        self.pages.insert(target_id, page.clone());
        Ok(page)
    }

    /// Drop every page and close the connection
    pub async fn close(&self) -> Result<()> {
        self.pages.clear();
        self.client.close().await?;
        Ok(())
    }
}

#[async_trait]
impl Browser for CdpBrowser {
    type Page = CdpPage;

    async fn new_page(&self) -> Result<Arc<CdpPage>> {
        let result = self
            .client
            .send_request(
                "Target.createTarget",
                Some(json!({ "url": "about:blank" })),
                None,
            )
            .await?;
        let created: CreateTargetResult = serde_json::from_value(result)?;

        tracing::debug!("Created page {}", created.target_id);
        self.attach(created.target_id).await
    }

    async fn pages(&self) -> Result<Vec<Arc<CdpPage>>> {
        let result = self
            .client
            .send_request("Target.getTargets", None, None)
            .await?;
        let infos: Vec<TargetInfo> = serde_json::from_value(result["targetInfos"].clone())?;
        let infos: Vec<TargetInfo> = infos
            .into_iter()
            .filter(|info| info.target_type == "page")
            .collect();

        let live: HashSet<&str> = infos.iter().map(|info| info.target_id.as_str()).collect();
        self.pages
            .retain(|id, page| live.contains(id.as_str()) && !page.is_closed());

        let mut pages = Vec::with_capacity(infos.len());
        for info in infos {
            let tracked = self.pages.get(&info.target_id).map(|p| p.value().clone());
            match tracked {
                Some(page) => pages.push(page),
                // Pages we did not open ourselves, e.g. the initial tab
                None => match self.attach(info.target_id.clone()).await {
                    Ok(page) => pages.push(page),
                    Err(e) => {
                        tracing::warn!("Could not attach to page {}: {}", info.target_id, e);
                    }
                },
            }
        }

        Ok(pages)
    }
}
