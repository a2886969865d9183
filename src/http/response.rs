//! Response writer module
//!
//! Maps handler and middleware return values to a status code, content
//! type, and serialized payload. String values go out as `text/plain`;
//! everything else is compact JSON. At most one response per request is
//! structural: the dispatcher returns exactly one of these.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde_json::Value;

use crate::logger;

/// Render a handler/middleware return value as a response.
///
/// `application/json` for objects and arrays, `text/plain` for strings and
/// other primitives. JSON is serialized with no pretty-printing.
pub fn render_value(value: &Value, status: StatusCode) -> Response<Full<Bytes>> {
    match value {
        Value::String(s) => build_text_response(s.clone(), status),
        Value::Object(_) | Value::Array(_) => match serde_json::to_string(value) {
            Ok(json) => build_json_response(json, status),
            Err(e) => {
                logger::log_error(&format!("Failed to serialize response value: {e}"));
                build_error_response("response serialization failed")
            }
        },
        primitive => build_text_response(primitive.to_string(), status),
    }
}

/// Build 404 Not Found response with the engine's structured body
pub fn build_not_found_response() -> Response<Full<Bytes>> {
    build_json_response(r#"{"error":"Not Found"}"#.to_string(), StatusCode::NOT_FOUND)
}

/// Build 500 Internal Server Error response.
///
/// `message` is the triggering error's message; stack traces are never
/// sent to the client.
pub fn build_error_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    build_json_response(body, StatusCode::INTERNAL_SERVER_ERROR)
}

/// Build 400 Bad Request response (strict body policy only)
pub fn build_bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    build_json_response(body, StatusCode::BAD_REQUEST)
}

fn build_json_response(json: String, status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Content-Length", json.len())
        .body(Full::new(Bytes::from(json)))
        .unwrap_or_else(|e| {
            log_build_error("JSON", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

fn build_text_response(text: String, status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .header("Content-Length", text.len())
        .body(Full::new(Bytes::from(text)))
        .unwrap_or_else(|e| {
            log_build_error("text", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Log response build error
fn log_build_error(kind: &str, error: &hyper::http::Error) {
    logger::log_error(&format!("Failed to build {kind} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content_type(resp: &Response<Full<Bytes>>) -> &str {
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap()
    }

    #[test]
    fn test_string_renders_as_plain_text() {
        let resp = render_value(&json!("Welcome"), StatusCode::OK);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(content_type(&resp), "text/plain");
    }

    #[test]
    fn test_object_renders_as_json() {
        let resp = render_value(&json!({"id": "42"}), StatusCode::OK);
        assert_eq!(content_type(&resp), "application/json");
    }

    #[test]
    fn test_array_renders_as_json() {
        let resp = render_value(&json!([1, 2, 3]), StatusCode::OK);
        assert_eq!(content_type(&resp), "application/json");
    }

    #[test]
    fn test_number_renders_as_plain_text() {
        let resp = render_value(&json!(7), StatusCode::OK);
        assert_eq!(content_type(&resp), "text/plain");
    }

    #[test]
    fn test_not_found_shape() {
        let resp = build_not_found_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(content_type(&resp), "application/json");
    }

    #[test]
    fn test_error_response_carries_message() {
        let resp = build_error_response("boom");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let len: usize = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap();
        assert_eq!(len, r#"{"error":"boom"}"#.len());
    }
}
