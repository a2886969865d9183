//! Routing module
//!
//! Compiles route path templates and resolves (method, path) pairs to
//! registered handlers, static entries first.

mod pattern;
mod table;

pub use pattern::{Pattern, PARAM_MARKER};
pub use table::{RouteMatch, RouteTable};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::dispatch::RequestContext;
use crate::error::HandlerError;

/// Boxed async route handler: `(body, context) -> value`
pub type HandlerFn =
    Arc<dyn Fn(Value, RequestContext) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// A registered route handler: either a literal response value or a callable.
///
/// Literals respond as-is at status 200; callables receive the parsed body
/// and the request context, and their errors surface as 500 responses.
#[derive(Clone)]
pub enum RouteHandler {
    Literal(Value),
    Func(HandlerFn),
}

impl RouteHandler {
    /// Wrap an async function as a route handler
    pub fn func<F, Fut>(f: F) -> Self
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self::Func(Arc::new(move |body, ctx| Box::pin(f(body, ctx))))
    }
}

impl fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}

impl From<Value> for RouteHandler {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for RouteHandler {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for RouteHandler {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}
