//! Per-visit event logs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Wall-clock milliseconds that never run backwards.
///
/// Anchored to the system clock once, then advanced by monotonic time.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    anchor_ms: u64,
    anchor: Instant,
}

impl Clock {
    pub fn new() -> Self {
        let anchor_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));

        Self {
            anchor_ms,
            anchor: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.anchor_ms.saturating_add(elapsed)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Milliseconds since the visit's first entry; `None` for that entry
    pub delta: Option<u64>,
    pub event: String,
    pub args: Vec<Value>,
}

/// Everything recorded during one visit, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitLog {
    pub entries: Vec<LogEntry>,
}

impl VisitLog {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.event.as_str())
    }
}

/// Append-only log for the current visit plus the sealed earlier ones
#[derive(Debug, Default)]
pub struct EventLog {
    current: Vec<LogEntry>,
    sealed: Vec<VisitLog>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, timestamp: u64, event: impl Into<String>, args: Vec<Value>) {
        let delta = self
            .current
            .first()
            .map(|first| timestamp.saturating_sub(first.timestamp));

        self.current.push(LogEntry {
            timestamp,
            delta,
            event: event.into(),
            args,
        });
    }

    /// Seal the current visit and start an empty one
    pub fn rotate(&mut self) {
        let entries = std::mem::take(&mut self.current);
        self.sealed.push(VisitLog { entries });
    }

    pub fn current_len(&self) -> usize {
        self.current.len()
    }

    pub fn sealed_len(&self) -> usize {
        self.sealed.len()
    }

    /// Sealed visits; an unrotated current visit is dropped
    pub fn into_visits(self) -> Vec<VisitLog> {
        self.sealed
    }
}
