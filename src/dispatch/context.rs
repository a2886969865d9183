//! Request context module
//!
//! One context is constructed per request and threaded through the
//! middleware pipeline to the route handler. Middleware may attach derived
//! state; mutations are visible to everything downstream.

use std::collections::HashMap;
use std::net::SocketAddr;

use hyper::body::Incoming;
use hyper::{Method, Request};
use serde_json::Value;

/// Per-request context shared by middleware and handlers
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Raw request target as received (path plus query string)
    pub target: String,
    /// Parsed pathname, without the query string
    pub path: String,
    /// Query parameters, percent-decoded; last value wins on duplicate keys
    pub query: HashMap<String, String>,
    /// Path parameters; populated only after a dynamic route match
    pub params: HashMap<String, String>,
    /// Request headers with lowercased names; last value wins
    pub headers: HashMap<String, String>,
    /// Parsed JSON body; `{}` until body reading completes (POST/PUT only)
    pub body: Value,
    pub peer_addr: SocketAddr,
}

impl RequestContext {
    /// Build a context from an incoming request's head
    pub fn new(req: &Request<Incoming>, peer_addr: SocketAddr) -> Self {
        let uri = req.uri();
        let mut headers = HashMap::new();
        for (name, value) in req.headers() {
            headers.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }

        Self {
            method: req.method().clone(),
            target: uri.to_string(),
            path: uri.path().to_string(),
            query: parse_query(uri.query().unwrap_or("")),
            params: HashMap::new(),
            headers,
            body: empty_object(),
            peer_addr,
        }
    }

    /// Convenience accessor for a single query parameter
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Convenience accessor for a single path parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn test(method: Method, path: &str) -> Self {
        Self {
            method,
            target: path.to_string(),
            path: path.to_string(),
            query: HashMap::new(),
            params: HashMap::new(),
            headers: HashMap::new(),
            body: empty_object(),
            peer_addr: "127.0.0.1:0".parse().unwrap(),
        }
    }
}

/// Empty JSON object, the default body value
pub fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Parse a raw query string into a map; built once per request.
///
/// Duplicate keys keep the last value. Components are percent-decoded with
/// `+` treated as space; undecodable components are kept raw.
pub fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut query = HashMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        query.insert(decode_component(key), decode_component(value));
    }
    query
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
