//! CDP Client - The Core Communication Layer
//!
//! Design decisions:
//! 1. Single WebSocket per browser connection (no per-session WS overhead)
//! 2. Async message passing - no locks on send/receive path
//! 3. Request/response matching via ID, events fanned out per CDP session
//! 4. Fail fast - no retries, no queuing. Let the caller decide.

use dashmap::DashMap;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::protocol::*;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Capacity of each per-session event channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on a single request/response round trip
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum CDPError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CDP protocol error: {code} - {message}")]
    Protocol { code: i32, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Connection closed")]
    Closed,

    #[error("Invalid response for request {0}")]
    InvalidResponse(RequestId),
}

/// Result type for CDP operations
pub type Result<T> = std::result::Result<T, CDPError>;

/// CDP Client - manages single WebSocket connection to browser
pub struct CDPClient {
    /// Monotonic request ID counter
    next_id: AtomicU64,

    /// Pending requests waiting for responses
    /// Key: request_id, Value: oneshot sender for response
    pending: Arc<DashMap<RequestId, oneshot::Sender<CDPResponse>>>,

    /// Event channels keyed by CDP session id.
    /// Browser-level events (no session) use the empty key.
    channels: Arc<DashMap<SessionId, broadcast::Sender<CDPEvent>>>,

    /// WebSocket write half (wrapped for concurrent sending)
    ws_sink: Arc<RwLock<WsSink>>,

    /// Stops the receiver task
    shutdown_tx: mpsc::Sender<()>,

    request_timeout: Duration,
}

impl CDPClient {
    /// Connect to Chrome DevTools Protocol endpoint
    pub async fn connect(ws_url: &str) -> Result<Arc<Self>> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (sink, mut stream) = ws_stream.split();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let client = Arc::new(Self {
            next_id: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            channels: Arc::new(DashMap::new()),
            ws_sink: Arc::new(RwLock::new(sink)),
            shutdown_tx,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        });

        // Spawn message receiver task
        let client_clone = client.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Err(e) = client_clone.handle_message(&text) {
                                    tracing::error!("Failed to handle message: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!("WebSocket closed");
                                break;
                            }
                            Some(Err(e)) => {
                                tracing::error!("WebSocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!("Shutdown signal received");
                        break;
                    }
                }
            }

            // Dropping the senders wakes every waiter with Closed
            client_clone.pending.clear();
            client_clone.channels.clear();
        });

        Ok(client)
    }

    /// Send CDP request and wait for response
    pub async fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CDPRequest {
            id,
            method: method.into(),
            params,
            session_id,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        // Serialize and send
        let json = serde_json::to_string(&request)?;
        let mut sink = self.ws_sink.write().await;
        if let Err(e) = sink.send(Message::Text(json)).await {
            self.pending.remove(&id);
            return Err(CDPError::WebSocket(e));
        }
        drop(sink); // Release lock immediately

        // Wait for response
        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(CDPError::Closed),
            Err(_) => {
                self.pending.remove(&id);
                return Err(CDPError::Timeout);
            }
        };

        if response.id != id {
            return Err(CDPError::InvalidResponse(id));
        }

        if let Some(error) = response.error {
            return Err(CDPError::Protocol {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Subscribe to events of one CDP session (`None` for browser-level events)
    ///
    /// The receiver only sees events that arrive after this call.
    pub fn events(&self, session_id: Option<&str>) -> broadcast::Receiver<CDPEvent> {
        self.channels
            .entry(session_id.unwrap_or_default().to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drop the event channel of a detached session
    pub fn forget_session(&self, session_id: &str) {
        self.channels.remove(session_id);
    }

    /// Handle incoming WebSocket message
    fn handle_message(&self, text: &str) -> Result<()> {
        let msg: CDPMessage = serde_json::from_str(text)?;

        match msg {
            CDPMessage::Response(response) => {
                if let Some((_, tx)) = self.pending.remove(&response.id) {
                    let _ = tx.send(response); // Ignore send errors (receiver dropped)
                } else {
                    tracing::warn!("Received response for unknown request: {}", response.id);
                }
            }
            CDPMessage::Event(event) => {
                let key = event.session_id.clone().unwrap_or_default();
                if let Some(tx) = self.channels.get(&key) {
                    let _ = tx.send(event); // No subscribers left is fine
                }
            }
        }

        Ok(())
    }

    /// Close connection gracefully
    pub async fn close(&self) -> Result<()> {
        let _ = self.shutdown_tx.try_send(());
        let mut sink = self.ws_sink.write().await;
        sink.close().await?;
        Ok(())
    }
}
