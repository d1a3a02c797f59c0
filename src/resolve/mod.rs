//! Request resolution pipeline.
//!
//! # Data Flow
//! ```text
//! request
//!     → origin rewrite (override, or header-driven)   [never responds]
//!     → static client assets                           [may respond]
//!     → prerendered pages                              [may respond]
//!     → renderer (+ client address, platform)
//!     → upgrade handoff check
//!     → response
//! ```
//!
//! # Design Decisions
//! - Strict order, first defined response wins, later stages never run
//! - Rewrites produce a replacement URI on the owned request; the
//!   original request snapshot threads through untouched
//! - The chain is built once from configuration and shared read-only

pub mod client_addr;
pub mod origin;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, Request, Response};
use hyper::upgrade::OnUpgrade;
use url::Url;

use crate::assets::{HeaderHook, StaticOptions, StaticServer};
use crate::config::{AssetConfig, GatewayConfig};
use crate::http::server::ServerHandle;
use crate::renderer::{ClientAddr, Platform, RenderError, Renderer, RequestEvent};
use crate::resolve::client_addr::ClientAddrResolver;
use crate::upgrade;

/// Failure while constructing the chain from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("invalid override origin: {0}")]
    InvalidOrigin(#[from] url::ParseError),

    #[error("invalid header name: {0}")]
    InvalidHeaderName(#[from] axum::http::header::InvalidHeaderName),

    #[error("failed to open static root: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure during a single dispatch, mapped to 500 by the host handler.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("static responder failed: {0}")]
    Assets(#[from] std::io::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// One stage of the resolution pipeline.
enum Resolver {
    /// Rewrite every request to the fixed origin.
    OverrideOrigin(Url),

    /// Rewrite the components named by configured headers, when present.
    HeaderOrigin {
        host: Option<HeaderName>,
        protocol: Option<HeaderName>,
    },

    /// Serve files from a static root.
    Assets {
        label: &'static str,
        server: StaticServer,
    },
}

/// A resolved dispatch: the response plus which stage produced it.
pub struct Dispatched {
    pub response: Response<Body>,

    /// Stage label for logging and metrics.
    pub source: &'static str,
}

/// Ordered, short-circuiting resolution pipeline.
pub struct ResolverChain {
    resolvers: Vec<Resolver>,
    client_addr: ClientAddrResolver,
    renderer: Arc<dyn Renderer>,
}

impl ResolverChain {
    /// Build the pipeline from configuration.
    pub fn from_config(
        config: &GatewayConfig,
        renderer: Arc<dyn Renderer>,
    ) -> Result<Self, ChainError> {
        let mut resolvers = Vec::new();

        if let Some(override_origin) = &config.origin.override_origin {
            resolvers.push(Resolver::OverrideOrigin(Url::parse(override_origin)?));
        } else if config.origin.host_header.is_some() || config.origin.protocol_header.is_some() {
            resolvers.push(Resolver::HeaderOrigin {
                host: config
                    .origin
                    .host_header
                    .as_deref()
                    .map(str::parse)
                    .transpose()?,
                protocol: config
                    .origin
                    .protocol_header
                    .as_deref()
                    .map(str::parse)
                    .transpose()?,
            });
        }

        let immutable_prefix = format!("/{}/immutable/", config.assets.app_dir);
        let client_hook: HeaderHook = Arc::new(move |headers, pathname| {
            if pathname.starts_with(&immutable_prefix) {
                headers.insert(
                    axum::http::header::CACHE_CONTROL,
                    axum::http::HeaderValue::from_static("public,max-age=31536000,immutable"),
                );
            }
        });
        if let Some(server) = StaticServer::open(
            &config.assets.root.join("client"),
            static_options(&config.assets),
            Some(client_hook),
        )? {
            resolvers.push(Resolver::Assets {
                label: "client",
                server,
            });
        }
        if let Some(server) = StaticServer::open(
            &config.assets.root.join("prerender"),
            static_options(&config.assets),
            None,
        )? {
            resolvers.push(Resolver::Assets {
                label: "prerender",
                server,
            });
        }

        Ok(Self {
            resolvers,
            client_addr: ClientAddrResolver::from_config(&config.client_addr)?,
            renderer,
        })
    }

    /// Number of configured stages ahead of the renderer.
    pub fn stage_count(&self) -> usize {
        self.resolvers.len()
    }

    /// Run one request through the pipeline.
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        server: Arc<ServerHandle>,
        peer: Option<String>,
    ) -> Result<Dispatched, DispatchError> {
        // snapshot the original request before any rewrite
        let (parts, body) = request.into_parts();
        let original = Arc::new(parts.clone());
        let mut request = Request::from_parts(parts, body);

        // keep the connection's upgrade future aside for a possible handoff
        let on_upgrade = request.extensions_mut().remove::<OnUpgrade>();

        for resolver in &self.resolvers {
            match resolver {
                Resolver::OverrideOrigin(origin_url) => {
                    *request.uri_mut() = origin::override_origin(request.uri(), origin_url);
                }
                Resolver::HeaderOrigin { host, protocol } => {
                    if let Some(uri) = origin::header_origin(
                        request.uri(),
                        request.headers(),
                        host.as_ref(),
                        protocol.as_ref(),
                    ) {
                        *request.uri_mut() = uri;
                    }
                }
                Resolver::Assets { label, server } => {
                    if let Some(response) =
                        server.respond(request.uri(), request.headers()).await?
                    {
                        tracing::debug!(
                            source = label,
                            path = %request.uri().path(),
                            status = %response.status(),
                            "served static asset"
                        );
                        return Ok(Dispatched {
                            response,
                            source: label,
                        });
                    }
                }
            }
        }

        let client_addr = ClientAddr::new(self.client_addr.resolve(&original.headers, peer));
        let event = RequestEvent::new(
            client_addr,
            Platform {
                original: original.clone(),
                server,
            },
        );
        let mut response = self.renderer.respond(request, event).await?;

        if let Some(handshake) = upgrade::attempt(on_upgrade, &original.headers, &mut response) {
            tracing::debug!("request upgraded to websocket");
            return Ok(Dispatched {
                response: handshake,
                source: "upgrade",
            });
        }
        Ok(Dispatched {
            response,
            source: "renderer",
        })
    }
}

fn static_options(config: &AssetConfig) -> StaticOptions {
    StaticOptions {
        dev: config.dev,
        etag: config.etag,
        gzip: config.gzip,
        brotli: config.brotli,
        dot_files: config.dot_files,
        extensions: config.extensions.clone(),
        max_age: config.max_age,
        immutable: config.immutable,
    }
}
