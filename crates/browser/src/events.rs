//! Event Bus - page events fanned out to subscribers
//!
//! Design: Type-safe events over a broadcast channel.
//! No dynamic dispatch overhead - use enums, not trait objects.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events a page reports while it is being observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageEvent {
    /// The main frame's DOM finished parsing
    DomContentLoaded,
    /// The main frame and its subresources finished loading
    Load,
    /// An uncaught exception in page script
    PageError { message: String },
    /// Any frame committed a navigation
    FrameNavigated { name: String, url: String },
}

/// Simple event bus using tokio broadcast channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PageEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: PageEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(PageEvent::DomContentLoaded);

        match rx.recv().await {
            Ok(PageEvent::DomContentLoaded) => {}
            _ => panic!("Expected DomContentLoaded event"),
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let bus = EventBus::new();
        bus.publish(PageEvent::Load);

        let mut rx = bus.subscribe();
        bus.publish(PageEvent::PageError {
            message: "boom".to_string(),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            PageEvent::PageError {
                message: "boom".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
