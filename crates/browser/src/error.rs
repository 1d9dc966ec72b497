//! Error types for browser operations
//!
//! Simple, flat error hierarchy. No over-engineering.

use std::time::Duration;
use thiserror::Error;

use crate::cdp::CDPError;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("CDP error: {0}")]
    Cdp(#[from] CDPError),

    #[error("Navigation to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Page is closed")]
    PageClosed,

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BrowserError {
    fn from(err: serde_json::Error) -> Self {
        BrowserError::Cdp(CDPError::Json(err))
    }
}
