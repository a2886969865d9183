//! Route pattern module
//!
//! Compiles a route path template into a segment-wise matcher and extracts
//! named parameter values from concrete request paths.

use std::collections::HashMap;

use crate::error::RegisterError;

/// Marker prefix denoting a named parameter segment (e.g. `/users/:id`)
pub const PARAM_MARKER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Matched by exact, case-sensitive string equality
    Literal(String),
    /// Matches exactly one non-empty path segment; captured under the name
    Param(String),
}

/// Compiled route pattern, anchored at both ends (exact segment count)
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl Pattern {
    /// Whether a route path contains any parameter marker segments
    pub fn is_dynamic(path: &str) -> bool {
        path.split('/').any(|s| s.starts_with(PARAM_MARKER))
    }

    /// Compile a route path into a matcher.
    ///
    /// Rejects paths with empty or duplicate parameter names; parameter
    /// names within one path must be unique so captures are unambiguous.
    pub fn compile(path: &str) -> Result<Self, RegisterError> {
        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();

        for seg in path.split('/') {
            if let Some(name) = seg.strip_prefix(PARAM_MARKER) {
                if name.is_empty() {
                    return Err(RegisterError::EmptyParam {
                        path: path.to_string(),
                    });
                }
                if param_names.iter().any(|n| n == name) {
                    return Err(RegisterError::DuplicateParam {
                        path: path.to_string(),
                        name: name.to_string(),
                    });
                }
                param_names.push(name.to_string());
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Literal(seg.to_string()));
            }
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
            param_names,
        })
    }

    /// The route path this pattern was compiled from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parameter names in declaration order
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a concrete request path against this pattern.
    ///
    /// Returns captured parameter values keyed by declared names, or `None`
    /// if the path does not match. Matching is case-sensitive with no
    /// wildcard or optional segments.
    pub fn matches(&self, concrete: &str) -> Option<HashMap<String, String>> {
        let parts: Vec<&str> = concrete.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }
        Some(params)
    }
}
