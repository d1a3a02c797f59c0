//! HTTP server setup and dispatch.
//!
//! # Responsibilities
//! - Create the Axum router wrapping the resolver chain
//! - Wire up middleware (timeout, request ID, tracing)
//! - Bind to TCP or a unix socket and serve with graceful shutdown
//! - Map unexpected dispatch errors to 500 responses
//!
//! # Design Decisions
//! - The request timeout wraps the whole dispatch, pipeline included
//! - Peer addresses come from connect-info extensions; unix-socket
//!   connections simply have none
//! - Every request goes through one `any`-method handler; the chain,
//!   not the router, decides what serves it

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::{TcpListener, UnixListener};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::request::{RequestIdLayer, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::renderer::Renderer;
use crate::resolve::{ChainError, ResolverChain};

/// Handle exposed to renderers through the platform object.
pub struct ServerHandle {
    addr: Mutex<Option<SocketAddr>>,
    shutdown: Shutdown,
}

impl ServerHandle {
    fn new() -> Self {
        Self {
            addr: Mutex::new(None),
            shutdown: Shutdown::new(),
        }
    }

    /// Bound TCP address, once serving has started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.addr.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ask the serve loop to drain and stop.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    fn set_local_addr(&self, addr: SocketAddr) {
        *self.addr.lock().unwrap_or_else(|e| e.into_inner()) = Some(addr);
    }
}

/// Application state injected into the dispatch handler.
#[derive(Clone)]
struct AppState {
    chain: Arc<ResolverChain>,
    handle: Arc<ServerHandle>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    handle: Arc<ServerHandle>,
}

impl HttpServer {
    /// Build the server from validated configuration and a renderer.
    pub fn new(config: GatewayConfig, renderer: Arc<dyn Renderer>) -> Result<Self, ChainError> {
        let handle = Arc::new(ServerHandle::new());
        let chain = Arc::new(ResolverChain::from_config(&config, renderer)?);
        tracing::info!(
            stages = chain.stage_count(),
            dev = config.assets.dev,
            "resolver chain built"
        );

        let state = AppState {
            chain,
            handle: handle.clone(),
        };
        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            handle,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(dispatch_handler))
            .route("/", any(dispatch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.listener.timeout_secs,
            )))
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    /// Handle given to renderers and the bootstrap.
    pub fn handle(&self) -> Arc<ServerHandle> {
        self.handle.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Serve over TCP, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        self.handle.set_local_addr(addr);
        tracing::info!(address = %addr, "gateway listening");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(self.handle.clone()))
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }

    /// Serve on a unix socket. Connections have no peer IP; client
    /// address derivation falls back to headers only.
    pub async fn run_unix(self, listener: UnixListener) -> Result<(), std::io::Error> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(socket = ?addr.as_pathname(), "gateway listening on unix socket");
        }

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal(self.handle.clone()))
            .await?;

        tracing::info!("gateway stopped");
        Ok(())
    }
}

/// Single entry point: every request runs the resolver chain.
async fn dispatch_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    match state
        .chain
        .dispatch(request, state.handle.clone(), peer)
        .await
    {
        Ok(dispatched) => {
            let status = dispatched.response.status();
            tracing::debug!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = %status,
                source = dispatched.source,
                "request resolved"
            );
            metrics::record_request(&method, status.as_u16(), dispatched.source, start_time);
            dispatched.response
        }
        Err(error) => {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                error = %error,
                "dispatch failed"
            );
            metrics::record_request(&method, 500, "error", start_time);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Wait for Ctrl+C or a handle-triggered shutdown.
async fn shutdown_signal(handle: Arc<ServerHandle>) {
    let mut triggered = handle.shutdown.subscribe();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                tracing::error!(%error, "failed to install Ctrl+C handler");
            }
            tracing::info!("shutdown signal received");
        }
        _ = triggered.recv() => {
            tracing::info!("shutdown requested through server handle");
        }
    }
}
