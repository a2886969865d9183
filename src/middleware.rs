//! Middleware pipeline module
//!
//! An ordered list of request interceptors with first-responder-wins
//! semantics: each stage either passes the context on or produces the
//! response value that ends the request.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::dispatch::RequestContext;
use crate::error::HandlerError;

/// Result of one middleware stage (and of the whole pipeline).
///
/// `Continue` hands the (possibly mutated) context to the next stage;
/// `Respond` short-circuits with the given value as the response body.
#[derive(Debug)]
pub enum Verdict {
    Continue(RequestContext),
    Respond(Value),
}

type MiddlewareFn =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<Verdict, HandlerError>> + Send + Sync>;

/// A single registered middleware stage
#[derive(Clone)]
pub struct Middleware(MiddlewareFn);

impl Middleware {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Verdict, HandlerError>> + Send + 'static,
    {
        Self(Arc::new(move |ctx| Box::pin(f(ctx))))
    }
}

/// Ordered middleware chain, evaluated sequentially per request
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Middleware>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Middleware) {
        self.stages.push(middleware);
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in registration order.
    ///
    /// The first stage returning `Respond` terminates the pipeline; later
    /// stages never run. A stage error also stops the pipeline and is
    /// propagated to the dispatcher, which answers with a generic 500.
    pub async fn run(&self, mut ctx: RequestContext) -> Result<Verdict, HandlerError> {
        for stage in &self.stages {
            match (stage.0)(ctx).await? {
                Verdict::Continue(next) => ctx = next,
                Verdict::Respond(value) => return Ok(Verdict::Respond(value)),
            }
        }
        Ok(Verdict::Continue(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: Arc<AtomicUsize>) -> Middleware {
        Middleware::new(move |ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Verdict::Continue(ctx))
            }
        })
    }

    fn responding(value: Value) -> Middleware {
        Middleware::new(move |_ctx| {
            let value = value.clone();
            async move { Ok(Verdict::Respond(value)) }
        })
    }

    #[tokio::test]
    async fn test_all_stages_run_in_order_when_none_responds() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pipeline = Pipeline::new();
        pipeline.push(counting(Arc::clone(&counter)));
        pipeline.push(counting(Arc::clone(&counter)));

        let ctx = RequestContext::test(Method::GET, "/");
        let verdict = pipeline.run(ctx).await.unwrap();
        assert!(matches!(verdict, Verdict::Continue(_)));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_responder_wins_and_halts_chain() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pipeline = Pipeline::new();
        pipeline.push(counting(Arc::clone(&counter)));
        pipeline.push(responding(json!({"blocked": true})));
        // Must never run
        pipeline.push(counting(Arc::clone(&counter)));

        let ctx = RequestContext::test(Method::GET, "/");
        let verdict = pipeline.run(ctx).await.unwrap();
        match verdict {
            Verdict::Respond(v) => assert_eq!(v, json!({"blocked": true})),
            Verdict::Continue(_) => panic!("pipeline should have short-circuited"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stage_error_stops_pipeline() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pipeline = Pipeline::new();
        pipeline.push(Middleware::new(|_ctx| async { Err("auth backend down".into()) }));
        pipeline.push(counting(Arc::clone(&counter)));

        let ctx = RequestContext::test(Method::GET, "/");
        let err = pipeline.run(ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "auth backend down");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mutations_visible_to_later_stages() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Middleware::new(|mut ctx: RequestContext| async move {
            ctx.params.insert("tenant".to_string(), "acme".to_string());
            Ok(Verdict::Continue(ctx))
        }));
        pipeline.push(Middleware::new(|ctx: RequestContext| async move {
            let tenant = ctx.param("tenant").unwrap_or("missing").to_string();
            Ok(Verdict::Respond(json!({ "tenant": tenant })))
        }));

        let ctx = RequestContext::test(Method::GET, "/");
        match pipeline.run(ctx).await.unwrap() {
            Verdict::Respond(v) => assert_eq!(v, json!({"tenant": "acme"})),
            Verdict::Continue(_) => panic!("second stage should have responded"),
        }
    }
}
