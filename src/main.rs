//! Demo server wiring the engine's public surface together

use skiff::{json, App, Config, Method, RouteHandler, Verdict};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    skiff::logger::init(&cfg)?;
    let addr = cfg.socket_addr()?;

    let mut app = App::with_config(cfg);

    // Answer health probes before any routing happens
    app.middleware(|ctx| async move {
        if ctx.path == "/healthz" {
            return Ok(Verdict::Respond(json!({"status": "ok"})));
        }
        Ok(Verdict::Continue(ctx))
    });

    app.get("/", "Welcome")?;
    app.handle(Method::GET, "/users/:id", |_body, ctx| async move {
        Ok(json!({ "id": ctx.param("id") }))
    })?;
    app.post("/echo", RouteHandler::func(|body, _ctx| async move { Ok(body) }))?;

    #[cfg(feature = "websocket")]
    app.socket(
        "/live",
        skiff::SocketHandlers::new()
            .on_open(|conn| async move {
                conn.send_text("connected");
            })
            .on_message(|conn, payload| async move {
                match payload {
                    skiff::SocketPayload::Json(value) => conn.broadcast_json(&value),
                    skiff::SocketPayload::Text(text) => conn.send_text(text),
                }
            }),
    )?;

    app.listen(addr).await?;
    Ok(())
}
