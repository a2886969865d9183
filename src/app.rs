//! Application server module
//!
//! The registration API (`App`) and the listen/accept loop (`Server`).
//! One `App` owns its route table, middleware list, and socket registry;
//! multiple independent instances can run in one process.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::{future::Future, io};

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Method;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::dispatch::{self, RequestContext};
use crate::error::{HandlerError, RegisterError};
use crate::logger;
use crate::middleware::{Middleware, Pipeline, Verdict};
use crate::routing::{RouteHandler, RouteTable};
#[cfg(feature = "websocket")]
use crate::ws::{ConnectionSet, SocketHandlers, SocketRegistry};

/// Immutable per-server state shared by every in-flight request.
///
/// Built once when the app binds; only read concurrently after that.
pub(crate) struct Engine {
    pub(crate) routes: RouteTable,
    pub(crate) pipeline: Pipeline,
    pub(crate) max_body_size: usize,
    pub(crate) body_policy: crate::body::BodyPolicy,
    pub(crate) access_log: bool,
    pub(crate) access_log_format: String,
    #[cfg(feature = "websocket")]
    pub(crate) sockets: SocketRegistry,
    #[cfg(feature = "websocket")]
    pub(crate) connections: Arc<ConnectionSet>,
}

/// Application builder: register middleware, routes, and socket handlers,
/// then bind and serve.
///
/// ```no_run
/// use skiff::App;
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     let mut app = App::new();
///     app.get("/", "Welcome").unwrap();
///     app.listen("127.0.0.1:8080".parse().unwrap()).await
/// }
/// ```
pub struct App {
    config: Config,
    routes: RouteTable,
    pipeline: Pipeline,
    #[cfg(feature = "websocket")]
    sockets: SocketRegistry,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    /// Create an app with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an app from loaded configuration
    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            routes: RouteTable::new(),
            pipeline: Pipeline::new(),
            #[cfg(feature = "websocket")]
            sockets: SocketRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Append a middleware stage. Stages run per request in registration
    /// order; the first one returning [`Verdict::Respond`] ends the request.
    pub fn middleware<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Verdict, HandlerError>> + Send + 'static,
    {
        self.pipeline.push(Middleware::new(f));
        self
    }

    /// Register a handler (literal value or callable) for (method, path)
    pub fn route(
        &mut self,
        method: Method,
        path: &str,
        handler: impl Into<RouteHandler>,
    ) -> Result<&mut Self, RegisterError> {
        self.routes.register(method, path, handler.into())?;
        Ok(self)
    }

    pub fn get(
        &mut self,
        path: &str,
        handler: impl Into<RouteHandler>,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::GET, path, handler)
    }

    pub fn post(
        &mut self,
        path: &str,
        handler: impl Into<RouteHandler>,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::POST, path, handler)
    }

    pub fn put(
        &mut self,
        path: &str,
        handler: impl Into<RouteHandler>,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::PUT, path, handler)
    }

    pub fn delete(
        &mut self,
        path: &str,
        handler: impl Into<RouteHandler>,
    ) -> Result<&mut Self, RegisterError> {
        self.route(Method::DELETE, path, handler)
    }

    /// Shorthand for registering an async route handler
    pub fn handle<F, Fut>(
        &mut self,
        method: Method,
        path: &str,
        f: F,
    ) -> Result<&mut Self, RegisterError>
    where
        F: Fn(Value, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.route(method, path, RouteHandler::func(f))
    }

    /// Register a socket handler set for an upgrade path (exact match only)
    #[cfg(feature = "websocket")]
    pub fn socket(
        &mut self,
        path: &str,
        handlers: SocketHandlers,
    ) -> Result<&mut Self, RegisterError> {
        self.sockets.register(path, handlers)?;
        Ok(self)
    }

    /// Socket registration without websocket support always fails with a
    /// typed error; HTTP dispatch is unaffected.
    #[cfg(not(feature = "websocket"))]
    pub fn socket(&mut self, _path: &str) -> Result<&mut Self, RegisterError> {
        Err(RegisterError::SocketsUnavailable)
    }

    /// Bind the listener and freeze registration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(self, addr: SocketAddr) -> io::Result<Server> {
        let listener = create_reusable_listener(addr)?;
        let engine = Arc::new(Engine {
            routes: self.routes,
            pipeline: self.pipeline,
            max_body_size: self.config.http.max_body_size,
            body_policy: self.config.http.body_policy,
            access_log: self.config.logging.access_log,
            access_log_format: self.config.logging.access_log_format.clone(),
            #[cfg(feature = "websocket")]
            sockets: self.sockets,
            #[cfg(feature = "websocket")]
            connections: Arc::new(ConnectionSet::new()),
        });

        Ok(Server {
            listener,
            engine,
            config: self.config,
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Bind and serve until the process exits
    pub async fn listen(self, addr: SocketAddr) -> io::Result<()> {
        self.bind(addr)?.serve().await
    }
}

/// A bound server ready to accept connections
pub struct Server {
    listener: TcpListener,
    engine: Arc<Engine>,
    config: Config,
    active_connections: Arc<AtomicUsize>,
}

impl Server {
    /// The address the listener actually bound (useful with port 0)
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever. A failed accept is logged, never fatal.
    pub async fn serve(self) -> io::Result<()> {
        let addr = self.listener.local_addr()?;
        logger::log_server_start(&addr, &self.config);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    self.accept_connection(stream, peer_addr);
                }
                Err(e) => {
                    logger::log_error(&format!("Failed to accept connection: {e}"));
                }
            }
        }
    }

    /// Admission-check a connection, then serve it on its own task
    fn accept_connection(&self, stream: TcpStream, peer_addr: SocketAddr) {
        // Increment first, then check the limit (prevents a race between
        // concurrent accepts)
        let prev_count = self.active_connections.fetch_add(1, Ordering::SeqCst);
        if let Some(max_conn) = self.config.performance.max_connections {
            if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
                self.active_connections.fetch_sub(1, Ordering::SeqCst);
                logger::log_warning(&format!(
                    "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
                ));
                drop(stream);
                return;
            }
        }

        if self.config.logging.access_log {
            logger::log_connection_accepted(&peer_addr);
        }

        let engine = Arc::clone(&self.engine);
        let counter = Arc::clone(&self.active_connections);
        let keep_alive = self.config.performance.keep_alive_timeout > 0;
        let timeout_secs = std::cmp::max(
            self.config.performance.read_timeout,
            self.config.performance.write_timeout,
        );

        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let timeout_duration = std::time::Duration::from_secs(timeout_secs);

            let mut builder = http1::Builder::new();
            builder.keep_alive(keep_alive);

            let service_engine = Arc::clone(&engine);
            let conn = builder
                .serve_connection(
                    io,
                    service_fn(move |req| {
                        let engine = Arc::clone(&service_engine);
                        async move { dispatch::dispatch(req, peer_addr, engine).await }
                    }),
                )
                // Required for the WebSocket handoff; a no-op otherwise
                .with_upgrades();

            match tokio::time::timeout(timeout_duration, conn).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => logger::log_connection_error(&err),
                Err(_) => {
                    logger::log_warning(&format!(
                        "Connection from {peer_addr} timed out after {timeout_secs} seconds"
                    ));
                }
            }

            counter.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

/// Create a `TcpListener` with `SO_REUSEADDR` (and `SO_REUSEPORT`) enabled,
/// so restarts can rebind a port still in TIME_WAIT.
fn create_reusable_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;
    // Non-blocking mode for async compatibility
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
