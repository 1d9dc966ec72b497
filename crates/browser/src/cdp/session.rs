//! CDP Session - Represents a connection to a specific browser target
//!
//! Design: Lightweight wrapper around CDPClient with target-specific context.
//! All sessions share the same WebSocket - no per-session connection overhead.

use super::client::{CDPClient, CDPError, Result};
use super::protocol::{
    AttachToTargetResult, CDPEvent, NavigateResult, SessionId, TargetId, TargetInfo,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Domains every crawled page needs: lifecycle events, script evaluation
/// and exceptions, cache control, runtime metrics.
const DEFAULT_DOMAINS: [&str; 4] = ["Page", "Runtime", "Network", "Performance"];

/// CDP Session bound to a specific target
#[derive(Clone)]
pub struct CDPSession {
    /// Shared CDP client
    client: Arc<CDPClient>,

    /// Target this session is attached to
    pub target_id: TargetId,

    /// Session ID assigned by Chrome
    pub session_id: SessionId,
}

impl CDPSession {
    /// Attach to a target and create session
    pub async fn attach(
        client: Arc<CDPClient>,
        target_id: TargetId,
        domains: Option<Vec<&str>>,
    ) -> Result<Self> {
        let result = client
            .send_request(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true,
                })),
                None,
            )
            .await?;

        let attach_result: AttachToTargetResult = serde_json::from_value(result)?;
        let session_id = attach_result.session_id;

        let domains = domains.unwrap_or_else(|| DEFAULT_DOMAINS.to_vec());
        let lifecycle = domains.contains(&"Page");

        // Enable all domains in parallel
        let enable_futures: Vec<_> = domains
            .into_iter()
            .map(|domain| {
                let client = client.clone();
                let session_id = session_id.clone();
                async move {
                    client
                        .send_request(format!("{}.enable", domain), None, Some(session_id))
                        .await
                }
            })
            .collect();

        // A page without its domains cannot report events, so any failure is fatal
        let results = futures_util::future::join_all(enable_futures).await;
        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            return Err(err);
        }

        // Navigations are matched to their lifecycle events by loader id
        if lifecycle {
            client
                .send_request(
                    "Page.setLifecycleEventsEnabled",
                    Some(json!({ "enabled": true })),
                    Some(session_id.clone()),
                )
                .await?;
        }

        Ok(Self {
            client,
            target_id,
            session_id,
        })
    }

    /// Send command within this session's context
    pub async fn send(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.client
            .send_request(method, params, Some(self.session_id.clone()))
            .await
    }

    /// Events emitted by this session's target
    pub fn events(&self) -> broadcast::Receiver<CDPEvent> {
        self.client.events(Some(&self.session_id))
    }

    /// Get current target info
    pub async fn get_target_info(&self) -> Result<TargetInfo> {
        let result = self
            .client
            .send_request(
                "Target.getTargetInfo",
                Some(json!({ "targetId": &self.target_id })),
                None,
            )
            .await?;

        Ok(serde_json::from_value(result["targetInfo"].clone())?)
    }

    /// Navigate to URL, optionally sending a referrer
    pub async fn navigate(&self, url: &str, referrer: Option<&str>) -> Result<NavigateResult> {
        let mut params = json!({ "url": url });
        if let Some(referrer) = referrer {
            params["referrer"] = json!(referrer);
        }

        let result = self.send("Page.navigate", Some(params)).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Evaluate JavaScript, returning the raw `Runtime.evaluate` result
    pub async fn evaluate(&self, expression: impl Into<String>) -> Result<Value> {
        self.send(
            "Runtime.evaluate",
            Some(json!({
                "expression": expression.into(),
                "returnByValue": true,
            })),
        )
        .await
    }

    /// Close the target and drop its event channel
    pub async fn close(&self) -> Result<()> {
        let result = self
            .client
            .send_request(
                "Target.closeTarget",
                Some(json!({ "targetId": &self.target_id })),
                None,
            )
            .await;
        self.client.forget_session(&self.session_id);

        match result {
            // Closing an already-gone target is not an error for us
            Err(CDPError::Protocol { message, .. }) if message.contains("No target") => Ok(()),
            other => other.map(|_| ()),
        }
    }
}
