//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the SSR gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address or unix socket, timeout).
    pub listener: ListenerConfig,

    /// Effective-origin rewriting.
    pub origin: OriginConfig,

    /// Client address derivation from proxy headers.
    pub client_addr: ClientAddrConfig,

    /// Static asset serving.
    pub assets: AssetConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind (ignored when `unix_socket` is set).
    pub host: String,

    /// Port to bind (ignored when `unix_socket` is set).
    pub port: u16,

    /// Serve on a unix socket instead of TCP.
    pub unix_socket: Option<PathBuf>,

    /// Request timeout in seconds, enforced around the whole dispatch.
    pub timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            unix_socket: None,
            timeout_secs: 30,
        }
    }
}

/// Origin rewriting configuration.
///
/// `override_origin` takes precedence; when set, every request's scheme,
/// host and port are replaced. Otherwise `host_header`/`protocol_header`
/// rewrite only the components present on the request.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct OriginConfig {
    /// Absolute URL whose origin replaces every request's origin.
    pub override_origin: Option<String>,

    /// Header carrying the effective host (e.g. "x-forwarded-host").
    pub host_header: Option<String>,

    /// Header carrying the effective scheme (e.g. "x-forwarded-proto").
    pub protocol_header: Option<String>,
}

/// Client address derivation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientAddrConfig {
    /// Header to derive the client address from. The value
    /// "x-forwarded-for" selects list extraction at `xff_depth`;
    /// any other name is taken verbatim.
    pub ip_header: Option<String>,

    /// Position from the end of the x-forwarded-for list
    /// (1 = nearest proxy's entry).
    pub xff_depth: u32,
}

impl Default for ClientAddrConfig {
    fn default() -> Self {
        Self {
            ip_header: None,
            xff_depth: 1,
        }
    }
}

/// Static asset serving configuration.
///
/// `root` is expected to contain `client/` (versioned build output) and
/// `prerender/` (static pages); each is optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory containing the `client` and `prerender` subdirectories.
    pub root: PathBuf,

    /// Name of the versioned build directory inside `client`
    /// (assets under `/<app_dir>/immutable/` get immutable cache-control).
    pub app_dir: String,

    /// Probe the filesystem per request instead of indexing at startup.
    pub dev: bool,

    /// Serve dotfiles (".well-known" is always served).
    pub dot_files: bool,

    /// Extensions tried when resolving extensionless paths.
    pub extensions: Vec<String>,

    /// Serve `.gz` variants to clients accepting gzip.
    pub gzip: bool,

    /// Serve `.br` variants to clients accepting brotli.
    pub brotli: bool,

    /// Emit weak ETags and honor If-None-Match.
    pub etag: bool,

    /// Cache-Control max-age for indexed files, in seconds.
    pub max_age: Option<u64>,

    /// Append `immutable` to the Cache-Control above.
    pub immutable: bool,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            app_dir: "_app".to_string(),
            dev: false,
            dot_files: false,
            extensions: vec!["html".to_string(), "htm".to_string()],
            gzip: true,
            brotli: true,
            etag: true,
            max_age: None,
            immutable: false,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Expose a Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Bind address for the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}
