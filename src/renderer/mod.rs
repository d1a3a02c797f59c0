//! External renderer interface.
//!
//! # Data Flow
//! ```text
//! dispatch (no static match)
//!     → Renderer::respond(rewritten request, RequestEvent)
//!         RequestEvent: client address accessor
//!                       + Platform (original request, server handle,
//!                         upgrade marking)
//!     → Response (possibly marked for upgrade)
//! ```
//!
//! # Design Decisions
//! - The renderer is an opaque trait object; templating and data
//!   loading live on the other side of this seam
//! - The client address is resolved eagerly but failure surfaces only
//!   when the renderer asks, as an explicit error on its error path
//! - The platform exposes the original, unrewritten request alongside
//!   the rewritten one the renderer receives

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Request, Response, StatusCode};

use crate::http::server::ServerHandle;
use crate::upgrade::{self, UpgradeHandler};

/// Raised when a renderer asks for a client address that could not be
/// derived from headers or the transport peer. Fatal for the request.
#[derive(Debug, thiserror::Error)]
#[error("unable to determine client address")]
pub struct ClientAddrError;

/// Renderer failure surfaced to the host request handler.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    ClientAddr(#[from] ClientAddrError),

    #[error("renderer failed: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Lazily-failing accessor for the derived client address.
#[derive(Debug, Clone)]
pub struct ClientAddr {
    resolved: Option<String>,
}

impl ClientAddr {
    pub(crate) fn new(resolved: Option<String>) -> Self {
        Self { resolved }
    }

    /// The derived address, or the explicit fatal error.
    pub fn get(&self) -> Result<&str, ClientAddrError> {
        self.resolved.as_deref().ok_or(ClientAddrError)
    }
}

/// Host capabilities handed to the renderer alongside each request.
#[derive(Clone)]
pub struct Platform {
    /// Snapshot of the original request before any origin rewrite.
    pub original: Arc<Parts>,

    /// Handle to the owning server.
    pub server: Arc<ServerHandle>,
}

impl Platform {
    /// Associate upgrade-handler data with a response. The response's
    /// body and status are untouched; the dispatcher performs the
    /// handoff after the renderer returns.
    pub fn mark_for_upgrade(&self, response: &mut Response<Body>, handler: Box<dyn UpgradeHandler>) {
        upgrade::mark_for_upgrade(response, handler);
    }
}

/// Per-request context passed to the renderer.
#[derive(Clone)]
pub struct RequestEvent {
    client_addr: ClientAddr,

    /// Host platform capabilities.
    pub platform: Platform,
}

impl RequestEvent {
    pub(crate) fn new(client_addr: ClientAddr, platform: Platform) -> Self {
        Self {
            client_addr,
            platform,
        }
    }

    /// Derived client network address; errors when none is available.
    pub fn client_address(&self) -> Result<&str, ClientAddrError> {
        self.client_addr.get()
    }
}

/// Opaque server-side renderer.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn respond(
        &self,
        request: Request<Body>,
        event: RequestEvent,
    ) -> Result<Response<Body>, RenderError>;
}

/// Built-in renderer for purely prerendered sites: the static stages in
/// front of it do all the serving, anything left over is a 404.
pub struct StaticSiteRenderer;

#[async_trait]
impl Renderer for StaticSiteRenderer {
    async fn respond(
        &self,
        request: Request<Body>,
        _event: RequestEvent,
    ) -> Result<Response<Body>, RenderError> {
        tracing::debug!(path = %request.uri().path(), "no static match, serving 404");
        let mut response = Response::new(Body::from("Not Found"));
        *response.status_mut() = StatusCode::NOT_FOUND;
        Ok(response)
    }
}
