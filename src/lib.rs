//! skiff - minimal HTTP application server
//!
//! Accepts raw connections, runs a configurable middleware chain,
//! dispatches to static or parameterized route handlers, parses JSON
//! request bodies under a hard size cap, and multiplexes WebSocket
//! sessions onto the same listening port.
//!
//! - Routes are literal values or async callables; static paths resolve in
//!   O(1) and always win over dynamic patterns
//! - Middleware is first-responder-wins: the first stage returning a value
//!   ends the request
//! - Oversized request bodies close the connection without a response
//! - WebSocket support lives behind the `websocket` feature (default on)

pub mod app;
pub mod body;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod logger;
pub mod middleware;
pub mod routing;
#[cfg(feature = "websocket")]
pub mod ws;

pub use app::{App, Server};
pub use body::BodyPolicy;
pub use config::Config;
pub use dispatch::RequestContext;
pub use error::{BodyError, EngineError, HandlerError, RegisterError};
pub use middleware::{Middleware, Verdict};
pub use routing::RouteHandler;
#[cfg(feature = "websocket")]
pub use ws::{SocketConn, SocketHandlers, SocketPayload};

// Handlers are registered against these, so keep them on the front page
pub use hyper::Method;
pub use serde_json::{json, Value};
