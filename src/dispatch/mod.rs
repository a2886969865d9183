//! Dispatch core module
//!
//! Orchestrates the request lifecycle: parse the URL into a context, run
//! the middleware pipeline, read the body when applicable, resolve the
//! route, invoke the handler, and write the response. Upgrade requests
//! branch to the socket router before any of that.

mod context;

pub use context::{empty_object, parse_query, RequestContext};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};

use crate::app::Engine;
use crate::body;
use crate::error::{BodyError, EngineError};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::middleware::Verdict;
use crate::routing::RouteHandler;

/// Serve one request. This is the connection service's entire body; any
/// `Err` returned here makes hyper tear the connection down without a
/// response frame.
pub(crate) async fn dispatch(
    req: Request<Incoming>,
    peer_addr: SocketAddr,
    engine: Arc<Engine>,
) -> Result<Response<Full<Bytes>>, EngineError> {
    #[cfg(feature = "websocket")]
    if crate::ws::is_upgrade_request(&req) {
        return crate::ws::handle_upgrade(req, peer_addr, &engine).await;
    }

    let started = Instant::now();
    let ctx = RequestContext::new(&req, peer_addr);

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        ctx.method.to_string(),
        ctx.path.clone(),
    );
    entry.query = req.uri().query().map(ToString::to_string);

    let response = run_lifecycle(req, ctx, &engine).await?;

    if engine.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = content_length(&response);
        entry.request_time_us =
            u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &engine.access_log_format);
    }

    Ok(response)
}

/// The HTTP request state machine: middleware, body, route, handler.
async fn run_lifecycle(
    req: Request<Incoming>,
    ctx: RequestContext,
    engine: &Engine,
) -> Result<Response<Full<Bytes>>, EngineError> {
    // 1. Middleware: first non-continue verdict ends the request. A stage
    //    error answers with a generic 500; later stages never ran.
    let mut ctx = match engine.pipeline.run(ctx).await {
        Ok(Verdict::Continue(ctx)) => ctx,
        Ok(Verdict::Respond(value)) => return Ok(http::render_value(&value, StatusCode::OK)),
        Err(e) => {
            logger::log_error(&format!("Middleware failure: {e}"));
            return Ok(http::build_error_response("Internal Server Error"));
        }
    };

    // 2. Body ingestion, POST/PUT only. The size cap aborts the connection.
    if ctx.method == Method::POST || ctx.method == Method::PUT {
        match body::read_json(req.into_body(), engine.max_body_size, engine.body_policy).await {
            Ok(value) => ctx.body = value,
            Err(BodyError::TooLarge { limit }) => {
                logger::log_warning(&format!(
                    "Body over {limit} bytes from {}; closing connection",
                    ctx.peer_addr
                ));
                return Err(EngineError::PayloadTooLarge { limit });
            }
            Err(BodyError::Transport(e)) => return Err(EngineError::BodyTransport(e)),
            Err(BodyError::Malformed(e)) => {
                return Ok(http::build_bad_request_response(&format!(
                    "invalid JSON body: {e}"
                )));
            }
        }
    }

    // 3. Route resolution; static entries win over dynamic ones.
    let Some(found) = engine.routes.resolve(&ctx.method, &ctx.path) else {
        return Ok(http::build_not_found_response());
    };
    ctx.params = found.params;

    // 4. Handler invocation. Literals respond as-is; callable failures
    //    surface as 500 with the error's message.
    Ok(match found.handler {
        RouteHandler::Literal(value) => http::render_value(&value, StatusCode::OK),
        RouteHandler::Func(handler) => {
            let input = ctx.body.clone();
            match handler(input, ctx).await {
                Ok(value) => http::render_value(&value, StatusCode::OK),
                Err(e) => {
                    logger::log_error(&format!("Handler failure: {e}"));
                    http::build_error_response(&e.to_string())
                }
            }
        }
    })
}

/// Response body size as recorded by the response writer
fn content_length(response: &Response<Full<Bytes>>) -> usize {
    response
        .headers()
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}
