//! Socket connection module
//!
//! Drives one upgraded connection: forwards inbound messages to the
//! registered handlers and tracks live connections for broadcast fan-out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::registry::SocketHandlers;
use crate::logger;

/// Payload delivered to message handlers.
///
/// Each inbound text frame is first tried as JSON; frames that do not parse
/// arrive as raw text, so handlers must tolerate either shape.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPayload {
    Json(Value),
    Text(String),
}

impl SocketPayload {
    pub(crate) fn from_text(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(raw.to_string()),
        }
    }
}

/// Live connections of one server instance, keyed by connection id.
///
/// Membership changes and broadcast enumeration both take the same lock,
/// so a removal can never corrupt an in-progress fan-out.
#[derive(Default)]
pub struct ConnectionSet {
    senders: Mutex<HashMap<u64, UnboundedSender<Message>>>,
    next_id: AtomicU64,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, UnboundedSender<Message>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, sender: UnboundedSender<Message>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, sender);
        id
    }

    fn remove(&self, id: u64) {
        self.lock().remove(&id);
    }

    /// Number of live connections
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send a message to every live connection
    pub fn broadcast(&self, message: &Message) {
        let senders = self.lock();
        for sender in senders.values() {
            // A send failure means the receiving task already exited; its
            // entry is removed when that task unwinds its connection.
            let _ = sender.send(message.clone());
        }
    }
}

/// Handle to one live socket connection, usable from any handler
#[derive(Clone)]
pub struct SocketConn {
    id: u64,
    peer_addr: SocketAddr,
    sender: UnboundedSender<Message>,
    set: Arc<ConnectionSet>,
}

impl SocketConn {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send a text frame to this connection
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.sender.send(Message::text(text.into()));
    }

    /// Send a value as a JSON text frame to this connection
    pub fn send_json(&self, value: &Value) {
        self.send_text(value.to_string());
    }

    /// Send a text frame to every live connection on this server
    pub fn broadcast_text(&self, text: impl Into<String>) {
        self.set.broadcast(&Message::text(text.into()));
    }

    /// Send a value as JSON to every live connection on this server
    pub fn broadcast_json(&self, value: &Value) {
        self.broadcast_text(value.to_string());
    }
}

/// Drive an upgraded connection until it terminates.
///
/// Lifecycle: join the connection set, run `open`, deliver each inbound
/// message, then run `close` and leave the set.
pub(crate) async fn drive<S>(
    ws: WebSocketStream<S>,
    path: String,
    handlers: SocketHandlers,
    set: Arc<ConnectionSet>,
    peer_addr: SocketAddr,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<Message>();

    let id = set.insert(sender.clone());
    let conn = SocketConn {
        id,
        peer_addr,
        sender,
        set: Arc::clone(&set),
    };

    // Writer task: everything queued on the handle goes out through here
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    logger::log_socket_opened(&path, &peer_addr);
    if let Some(open) = &handlers.open {
        open(conn.clone()).await;
    }

    while let Some(item) = stream.next().await {
        match item {
            Ok(Message::Text(text)) => {
                if let Some(message) = &handlers.message {
                    message(conn.clone(), SocketPayload::from_text(text.as_str())).await;
                }
            }
            Ok(Message::Binary(bytes)) => {
                if let Some(message) = &handlers.message {
                    let text = String::from_utf8_lossy(&bytes);
                    message(conn.clone(), SocketPayload::from_text(&text)).await;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {} // ping/pong handled by the protocol layer
        }
    }

    if let Some(close) = &handlers.close {
        close(conn.clone()).await;
    }
    set.remove(id);
    logger::log_socket_closed(&path, &peer_addr);

    // Dropping the last sender ends the writer loop after it drains
    drop(conn);
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_parses_json() {
        let payload = SocketPayload::from_text(r#"{"kind":"chat"}"#);
        assert_eq!(payload, SocketPayload::Json(json!({"kind": "chat"})));
    }

    #[test]
    fn test_payload_falls_back_to_raw_text() {
        let payload = SocketPayload::from_text("hello there");
        assert_eq!(payload, SocketPayload::Text("hello there".to_string()));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_member() {
        let set = ConnectionSet::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = set.insert(tx_a);
        let _b = set.insert(tx_b);
        assert_eq!(set.len(), 2);

        set.broadcast(&Message::text("fan-out"));
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());

        set.remove(a);
        assert_eq!(set.len(), 1);
        set.broadcast(&Message::text("again"));
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());
    }
}
