//! Socket route registry
//!
//! Maps an upgrade request's path to a registered handler set. Paths are
//! exact-match only, no dynamic segments. Registering the same path twice
//! is rejected so a later registration can never silently shadow an
//! earlier one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use super::connection::{SocketConn, SocketPayload};
use crate::error::RegisterError;

type OpenFn = Arc<dyn Fn(SocketConn) -> BoxFuture<'static, ()> + Send + Sync>;
type MessageFn = Arc<dyn Fn(SocketConn, SocketPayload) -> BoxFuture<'static, ()> + Send + Sync>;
type CloseFn = Arc<dyn Fn(SocketConn) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handler set for one socket route; every hook is optional
#[derive(Clone, Default)]
pub struct SocketHandlers {
    pub(crate) open: Option<OpenFn>,
    pub(crate) message: Option<MessageFn>,
    pub(crate) close: Option<CloseFn>,
}

impl SocketHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once after a successful upgrade
    pub fn on_open<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SocketConn) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.open = Some(Arc::new(move |conn| Box::pin(f(conn))));
        self
    }

    /// Called for every inbound message
    pub fn on_message<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SocketConn, SocketPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.message = Some(Arc::new(move |conn, payload| Box::pin(f(conn, payload))));
        self
    }

    /// Called once when the connection terminates
    pub fn on_close<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(SocketConn) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.close = Some(Arc::new(move |conn| Box::pin(f(conn))));
        self
    }
}

/// Socket routes owned by one server instance
#[derive(Default)]
pub struct SocketRegistry {
    routes: HashMap<String, SocketHandlers>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler set for an upgrade path
    pub fn register(&mut self, path: &str, handlers: SocketHandlers) -> Result<(), RegisterError> {
        if self.routes.contains_key(path) {
            return Err(RegisterError::DuplicateSocketRoute(path.to_string()));
        }
        self.routes.insert(path.to_string(), handlers);
        Ok(())
    }

    /// Resolve an upgrade path; exact match only
    pub fn resolve(&self, path: &str) -> Option<SocketHandlers> {
        self.routes.get(path).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve_exact() {
        let mut registry = SocketRegistry::new();
        registry.register("/chat", SocketHandlers::new()).unwrap();

        assert!(registry.resolve("/chat").is_some());
        assert!(registry.resolve("/chat/room").is_none());
        assert!(registry.resolve("/Chat").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = SocketRegistry::new();
        registry.register("/chat", SocketHandlers::new()).unwrap();

        let err = registry
            .register("/chat", SocketHandlers::new())
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::RegisterError::DuplicateSocketRoute(_)
        ));
        // The original registration survives
        assert!(registry.resolve("/chat").is_some());
    }
}
