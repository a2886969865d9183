//! Route table module
//!
//! Holds static (exact-match) and dynamic (pattern-match) handlers per HTTP
//! method. Static entries resolve in O(1) and always take priority over
//! dynamic ones for the same concrete path; dynamic entries match in
//! registration order, first match wins.

use std::collections::HashMap;

use hyper::Method;

use super::pattern::Pattern;
use super::RouteHandler;
use crate::error::RegisterError;

struct DynamicRoute {
    pattern: Pattern,
    handler: RouteHandler,
}

/// A successful route resolution
pub struct RouteMatch {
    pub handler: RouteHandler,
    /// Captured parameter values; empty for static matches
    pub params: HashMap<String, String>,
}

/// Per-method route storage
#[derive(Default)]
pub struct RouteTable {
    static_routes: HashMap<Method, HashMap<String, RouteHandler>>,
    dynamic_routes: HashMap<Method, Vec<DynamicRoute>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for (method, path).
    ///
    /// Paths containing parameter markers append to the method's dynamic
    /// list; all other paths insert into the method's static map,
    /// overwriting any prior handler for that exact pair.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: RouteHandler,
    ) -> Result<(), RegisterError> {
        if Pattern::is_dynamic(path) {
            let pattern = Pattern::compile(path)?;
            self.dynamic_routes
                .entry(method)
                .or_default()
                .push(DynamicRoute { pattern, handler });
        } else {
            self.static_routes
                .entry(method)
                .or_default()
                .insert(path.to_string(), handler);
        }
        Ok(())
    }

    /// Resolve (method, pathname) to a handler.
    ///
    /// Checks the static map first, then scans the dynamic list in
    /// registration order. Returns `None` when nothing matches.
    pub fn resolve(&self, method: &Method, pathname: &str) -> Option<RouteMatch> {
        if let Some(handler) = self
            .static_routes
            .get(method)
            .and_then(|routes| routes.get(pathname))
        {
            return Some(RouteMatch {
                handler: handler.clone(),
                params: HashMap::new(),
            });
        }

        self.dynamic_routes.get(method).and_then(|routes| {
            routes.iter().find_map(|route| {
                route.pattern.matches(pathname).map(|params| RouteMatch {
                    handler: route.handler.clone(),
                    params,
                })
            })
        })
    }
}
