//! Error types module
//!
//! Defines the engine's error taxonomy:
//! - registration-time errors (bad patterns, duplicate socket routes)
//! - body ingestion errors (size cap, transport, malformed JSON)
//! - service-level errors that abort the connection without a response

use thiserror::Error;

/// Boxed error returned by user-written handlers and middleware.
///
/// Handler failures are recovered at the dispatch boundary and surfaced to
/// the client as a 500 JSON body carrying the error's message.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while registering routes, middleware, or socket handlers.
///
/// Registration happens during setup, before the listener accepts traffic,
/// so these are programming errors worth failing loudly on.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// A route path declares the same parameter name twice.
    #[error("route pattern {path:?} declares parameter {name:?} more than once")]
    DuplicateParam { path: String, name: String },

    /// A route path contains a bare parameter marker with no name.
    #[error("route pattern {path:?} contains a parameter segment with no name")]
    EmptyParam { path: String },

    /// A socket route was registered twice for the same path.
    #[error("socket route {0:?} is already registered")]
    DuplicateSocketRoute(String),

    /// Socket registration was attempted without websocket support compiled in.
    #[error("websocket support is not available (build with the `websocket` feature)")]
    SocketsUnavailable,
}

/// Errors raised while ingesting a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The accumulated body exceeded the configured cap. The connection is
    /// torn down without an HTTP response.
    #[error("request body exceeded the {limit} byte limit")]
    TooLarge { limit: usize },

    /// The underlying stream failed mid-read.
    #[error("failed to read request body: {0}")]
    Transport(#[source] HandlerError),

    /// The body was not valid JSON. Only raised under [`crate::BodyPolicy::Strict`];
    /// the lenient policy swallows parse failures and yields an empty object.
    #[error("request body is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
}

/// Errors returned from the connection service itself.
///
/// Returning one of these to hyper aborts the connection with no response
/// frame, which is exactly the contract for oversized payloads and refused
/// upgrades. Everything recoverable (404, 500) is turned into a response
/// before reaching this type.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Hard security cutoff: the body cap was hit mid-stream.
    #[error("request body exceeded the {limit} byte limit; closing connection")]
    PayloadTooLarge { limit: usize },

    /// The request stream failed before a response could be formed.
    #[error("request body transport failure: {0}")]
    BodyTransport(#[source] HandlerError),

    /// An upgrade request targeted a path with no registered socket route.
    #[error("no socket route registered for {path:?}; refusing upgrade")]
    UpgradeRefused { path: String },

    /// An upgrade request was missing the websocket handshake key.
    #[error("upgrade request is missing Sec-WebSocket-Key")]
    MissingUpgradeKey,

    /// A response could not be assembled at the http layer.
    #[error(transparent)]
    Http(#[from] hyper::http::Error),
}
