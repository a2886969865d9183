//! End-to-end tests speaking raw HTTP/1.1 over TCP against a bound app

use std::collections::HashMap;
use std::net::SocketAddr;

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use skiff::{App, BodyPolicy, Config, Method, RouteHandler, Verdict};

struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: String,
}

async fn spawn_app(app: App) -> SocketAddr {
    let server = app.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());
    addr
}

/// Write a raw request and read until the server closes the connection.
/// Returns `None` when the connection died without a complete response.
async fn send_raw(addr: SocketAddr, request: &[u8]) -> Option<RawResponse> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    // The server may slam the door mid-write (body cap); that is expected
    let _ = stream.write_all(request).await;
    let _ = stream.flush().await;

    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf).await;
    parse_response(&buf)
}

fn parse_response(raw: &[u8]) -> Option<RawResponse> {
    let text = String::from_utf8_lossy(raw);
    let (head, body) = text.split_once("\r\n\r\n")?;
    let mut lines = head.lines();
    let status_line = lines.next()?;
    let status: u16 = status_line.split_whitespace().nth(1)?.parse().ok()?;

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    Some(RawResponse {
        status,
        headers,
        body: body.to_string(),
    })
}

fn get(path: &str) -> Vec<u8> {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").into_bytes()
}

fn post(path: &str, body: &[u8]) -> Vec<u8> {
    let mut req = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    req.extend_from_slice(body);
    req
}

#[tokio::test]
async fn test_literal_route_returns_plain_text() {
    let mut app = App::new();
    app.get("/", "Welcome").unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &get("/")).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.headers.get("content-type").unwrap(), "text/plain");
    assert_eq!(resp.body, "Welcome");
}

#[tokio::test]
async fn test_dynamic_route_extracts_param() {
    let mut app = App::new();
    app.handle(Method::GET, "/users/:id", |_body, ctx| async move {
        Ok(json!({ "id": ctx.param("id") }))
    })
    .unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &get("/users/42")).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(
        resp.headers.get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(resp.body, r#"{"id":"42"}"#);
}

#[tokio::test]
async fn test_query_parameters_reach_handler() {
    let mut app = App::new();
    app.handle(Method::GET, "/search", |_body, ctx| async move {
        Ok(json!({ "q": ctx.query_param("q") }))
    })
    .unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &get("/search?q=js")).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, r#"{"q":"js"}"#);
}

#[tokio::test]
async fn test_unregistered_path_is_404() {
    let mut app = App::new();
    app.get("/", "Welcome").unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &get("/nope")).await.unwrap();
    assert_eq!(resp.status, 404);
    assert_eq!(
        resp.headers.get("content-type").unwrap(),
        "application/json"
    );
    assert_eq!(resp.body, r#"{"error":"Not Found"}"#);
}

#[tokio::test]
async fn test_handler_error_is_500_with_message_only() {
    let mut app = App::new();
    app.handle(Method::GET, "/boom", |_body, _ctx| async move {
        Err::<serde_json::Value, _>("database exploded".into())
    })
    .unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &get("/boom")).await.unwrap();
    assert_eq!(resp.status, 500);
    // The message, nothing else: no stack trace content
    assert_eq!(resp.body, r#"{"error":"database exploded"}"#);
}

#[tokio::test]
async fn test_malformed_json_body_is_swallowed_by_default() {
    let mut app = App::new();
    app.post("/echo", RouteHandler::func(|body, _ctx| async move { Ok(body) }))
        .unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &post("/echo", b"{definitely not json"))
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "{}");
}

#[tokio::test]
async fn test_malformed_json_body_is_400_under_strict_policy() {
    let mut cfg = Config::default();
    cfg.http.body_policy = BodyPolicy::Strict;
    let mut app = App::with_config(cfg);
    app.post("/echo", RouteHandler::func(|body, _ctx| async move { Ok(body) }))
        .unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &post("/echo", b"{broken")).await.unwrap();
    assert_eq!(resp.status, 400);
    assert!(resp.body.contains("error"));
}

#[tokio::test]
async fn test_body_at_exactly_the_cap_is_accepted() {
    let mut app = App::new();
    app.post(
        "/ingest",
        RouteHandler::func(|_body, _ctx| async move { Ok(json!({"ok": true})) }),
    )
    .unwrap();
    let addr = spawn_app(app).await;

    // A JSON string padded to exactly 1,000,000 bytes
    let mut payload = vec![b'"'];
    payload.resize(999_999, b'a');
    payload.push(b'"');
    assert_eq!(payload.len(), 1_000_000);

    let resp = send_raw(addr, &post("/ingest", &payload)).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, r#"{"ok":true}"#);
}

#[tokio::test]
async fn test_body_over_the_cap_kills_the_connection() {
    let mut app = App::new();
    app.post(
        "/ingest",
        RouteHandler::func(|_body, _ctx| async move { Ok(json!({"ok": true})) }),
    )
    .unwrap();
    let addr = spawn_app(app).await;

    let payload = vec![b'a'; 1_000_001];
    // No HTTP response frame at all: the connection is torn down
    assert!(send_raw(addr, &post("/ingest", &payload)).await.is_none());
}

#[tokio::test]
async fn test_middleware_response_preempts_route_handler() {
    let mut app = App::new();
    app.middleware(|ctx| async move {
        if ctx.path == "/blocked" {
            return Ok(Verdict::Respond(json!("from middleware")));
        }
        Ok(Verdict::Continue(ctx))
    });
    app.get("/blocked", "from handler").unwrap();
    app.get("/open", "from handler").unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &get("/blocked")).await.unwrap();
    assert_eq!(resp.body, "from middleware");

    let resp = send_raw(addr, &get("/open")).await.unwrap();
    assert_eq!(resp.body, "from handler");
}

#[tokio::test]
async fn test_middleware_failure_is_generic_500() {
    let mut app = App::new();
    app.middleware(|_ctx| async move { Err("secret backend detail".into()) });
    app.get("/", "Welcome").unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &get("/")).await.unwrap();
    assert_eq!(resp.status, 500);
    // Middleware failures are generic; the message stays in the server log
    assert_eq!(resp.body, r#"{"error":"Internal Server Error"}"#);
}

#[tokio::test]
async fn test_static_route_beats_dynamic_end_to_end() {
    let mut app = App::new();
    app.handle(Method::GET, "/users/:id", |_body, ctx| async move {
        Ok(json!({ "id": ctx.param("id") }))
    })
    .unwrap();
    app.get("/users/me", "the static one").unwrap();
    let addr = spawn_app(app).await;

    let resp = send_raw(addr, &get("/users/me")).await.unwrap();
    assert_eq!(resp.body, "the static one");

    let resp = send_raw(addr, &get("/users/7")).await.unwrap();
    assert_eq!(resp.body, r#"{"id":"7"}"#);
}
