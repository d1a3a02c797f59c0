//! Shared utilities for gateway integration tests.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use ssr_gateway::config::GatewayConfig;
use ssr_gateway::{HttpServer, Renderer, ServerHandle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Config pointing at a site root, everything else default.
pub fn site_config(root: &Path) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.assets.root = root.to_path_buf();
    config
}

/// Start a gateway on an ephemeral port.
pub async fn spawn_gateway(
    config: GatewayConfig,
    renderer: Arc<dyn Renderer>,
) -> (SocketAddr, Arc<ServerHandle>) {
    let server = HttpServer::new(config, renderer).expect("resolver chain should build");
    let handle = server.handle();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    // The serve task records its address on first poll; yield until it
    // has started so callers observe a running server.
    while handle.local_addr().is_none() {
        tokio::task::yield_now().await;
    }
    (addr, handle)
}

/// Send a raw HTTP/1.1 request, bypassing client-side URL normalization.
/// The request must carry `Connection: close`.
#[allow(dead_code)]
pub async fn raw_request(addr: SocketAddr, request: &str) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    socket.read_to_string(&mut response).await.unwrap();
    response
}
