//! WebSocket module
//!
//! Multiplexes WebSocket sessions onto the HTTP listening port. Upgrade
//! requests bypass the HTTP pipeline: the path is resolved against the
//! socket registry, the handshake completes with a 101, and the promoted
//! connection is handed to its handler set. Unknown paths destroy the
//! connection with no HTTP response.

mod connection;
mod registry;

pub use connection::{ConnectionSet, SocketConn, SocketPayload};
pub use registry::{SocketHandlers, SocketRegistry};

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

use crate::app::Engine;
use crate::error::EngineError;
use crate::logger;

/// Whether a request asks to be promoted to a WebSocket session
pub(crate) fn is_upgrade_request(req: &Request<Incoming>) -> bool {
    req.headers()
        .get(UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}

/// Complete the upgrade handshake and hand the connection to its handlers.
///
/// Returns the 101 response to send back; the promoted connection is
/// driven on its own task once hyper finishes the protocol switch. An
/// unregistered path or a missing handshake key yields an error, which
/// aborts the connection without any HTTP response.
pub(crate) async fn handle_upgrade(
    mut req: Request<Incoming>,
    peer_addr: SocketAddr,
    engine: &Arc<Engine>,
) -> Result<Response<Full<Bytes>>, EngineError> {
    let path = req.uri().path().to_string();

    let Some(handlers) = engine.sockets.resolve(&path) else {
        return Err(EngineError::UpgradeRefused { path });
    };

    let key = req
        .headers()
        .get(SEC_WEBSOCKET_KEY)
        .ok_or(EngineError::MissingUpgradeKey)?;
    let accept_key = derive_accept_key(key.as_bytes());

    let on_upgrade = hyper::upgrade::on(&mut req);
    let connections = Arc::clone(&engine.connections);
    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let io = TokioIo::new(upgraded);
                let ws = WebSocketStream::from_raw_socket(io, Role::Server, None).await;
                connection::drive(ws, path, handlers, connections, peer_addr).await;
            }
            Err(e) => logger::log_error(&format!("Upgrade failed for {peer_addr}: {e}")),
        }
    });

    Ok(Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(CONNECTION, "Upgrade")
        .header(UPGRADE, "websocket")
        .header(SEC_WEBSOCKET_ACCEPT, accept_key)
        .body(Full::new(Bytes::new()))?)
}
