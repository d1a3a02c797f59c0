//! SSR gateway binary.
//!
//! Serves a built application directory (static `client/` and
//! `prerender/` subtrees) behind the resolver chain, with the built-in
//! static-site renderer answering anything left over.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::{TcpListener, UnixListener};

use ssr_gateway::config::loader::load_config;
use ssr_gateway::config::validation::validate_config;
use ssr_gateway::config::GatewayConfig;
use ssr_gateway::observability::{logging, metrics};
use ssr_gateway::{HttpServer, StaticSiteRenderer};

/// Serve a built SSR application directory.
#[derive(Debug, Parser)]
#[command(name = "ssr-gateway", version)]
struct Cli {
    /// TOML configuration file; flags below override its values.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Host to listen on.
    #[arg(long)]
    host: Option<String>,

    /// Serve on a unix socket instead.
    #[arg(long, short = 'u')]
    unix_socket: Option<PathBuf>,

    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Override the origin of every request.
    #[arg(long, short = 'O')]
    override_origin: Option<String>,

    /// Host header to derive the effective host from.
    #[arg(long, short = 'H')]
    host_header: Option<String>,

    /// Protocol header to derive the effective scheme from.
    #[arg(long, short = 'P')]
    protocol_header: Option<String>,

    /// IP header to derive the client address from.
    #[arg(long, short = 'i')]
    ip_header: Option<String>,

    /// X-Forwarded-For depth, from the end of the list.
    #[arg(long, short = 'x')]
    xff_depth: Option<u32>,

    /// Directory containing the client/ and prerender/ subdirectories.
    #[arg(long, short = 'r')]
    root: Option<PathBuf>,

    /// Probe the filesystem per request instead of indexing at startup.
    #[arg(long)]
    dev: bool,
}

impl Cli {
    /// Fold CLI flags over the file-based configuration.
    fn apply(self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(socket) = self.unix_socket {
            config.listener.unix_socket = Some(socket);
        }
        if let Some(timeout) = self.timeout {
            config.listener.timeout_secs = timeout;
        }
        if let Some(origin) = self.override_origin {
            config.origin.override_origin = Some(origin);
        }
        if let Some(header) = self.host_header {
            config.origin.host_header = Some(header);
        }
        if let Some(header) = self.protocol_header {
            config.origin.protocol_header = Some(header);
        }
        if let Some(header) = self.ip_header {
            config.client_addr.ip_header = Some(header);
        }
        if let Some(depth) = self.xff_depth {
            config.client_addr.xff_depth = depth;
        }
        if let Some(root) = self.root {
            config.assets.root = root;
        }
        if self.dev {
            config.assets.dev = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let cli = Cli::parse();
    let base = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    let config = cli.apply(base);
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        return Err("configuration validation failed".into());
    }

    tracing::info!(
        root = %config.assets.root.display(),
        dev = config.assets.dev,
        timeout_secs = config.listener.timeout_secs,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config.clone(), Arc::new(StaticSiteRenderer))?;

    if let Some(path) = &config.listener.unix_socket {
        // stale socket files keep bind from succeeding
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        server.run_unix(listener).await?;
    } else {
        let listener =
            TcpListener::bind((config.listener.host.as_str(), config.listener.port)).await?;
        server.run(listener).await?;
    }

    Ok(())
}
