//! WebSocket upgrade correlation and handoff.
//!
//! # Responsibilities
//! - Record a renderer's upgrade intent on the exact response it marked
//! - Validate the original request is a WebSocket upgrade
//! - Complete the handshake and hand the socket to the handler
//!
//! # Design Decisions
//! - The association is an owned extension on the response value, so it
//!   lives exactly as long as the response and cannot grow with request
//!   count
//! - A rejected or impossible upgrade falls back to sending the
//!   buffered HTTP response; never a failure
//! - On success the dispatcher yields the 101 handshake response and
//!   the connection belongs to the handler's task from then on

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

/// Server-side socket handed to an upgrade handler.
pub type WebSocket = WebSocketStream<TokioIo<Upgraded>>;

/// Owns the connection after a successful upgrade handoff.
#[async_trait]
pub trait UpgradeHandler: Send + 'static {
    async fn handle(self: Box<Self>, socket: WebSocket);
}

/// Upgrade association carried on a marked response.
///
/// The inner mutex exists only to satisfy the extension map's bounds;
/// it is locked exactly once, by the dispatcher that takes the handler.
#[derive(Clone)]
struct PendingUpgrade(Arc<Mutex<Option<Box<dyn UpgradeHandler>>>>);

/// Record an upgrade association on `response` without touching its
/// status or body.
pub fn mark_for_upgrade(response: &mut Response<Body>, handler: Box<dyn UpgradeHandler>) {
    response
        .extensions_mut()
        .insert(PendingUpgrade(Arc::new(Mutex::new(Some(handler)))));
}

/// Attempt the handoff for a renderer response.
///
/// Returns the `101 Switching Protocols` handshake response when the
/// response was marked and the original request is an acceptable
/// WebSocket upgrade; `None` means the caller sends `response` as-is.
pub fn attempt(
    on_upgrade: Option<OnUpgrade>,
    request_headers: &HeaderMap,
    response: &mut Response<Body>,
) -> Option<Response<Body>> {
    let pending = response.extensions_mut().remove::<PendingUpgrade>()?;
    let handler = pending.0.lock().ok()?.take()?;

    let on_upgrade = match on_upgrade {
        Some(on_upgrade) => on_upgrade,
        None => {
            tracing::warn!("response marked for upgrade but connection is not upgradable");
            return None;
        }
    };
    if !is_websocket_request(request_headers) {
        tracing::warn!("response marked for upgrade but request is not a websocket handshake");
        return None;
    }
    let key = request_headers.get(header::SEC_WEBSOCKET_KEY)?;
    let accept = derive_accept_key(key.as_bytes());

    // carry the marked response's application headers on the handshake
    let mut headers = response.headers().clone();
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::CONTENT_TYPE);
    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(
        header::SEC_WEBSOCKET_ACCEPT,
        HeaderValue::from_str(&accept).ok()?,
    );

    tokio::spawn(async move {
        match on_upgrade.await {
            Ok(upgraded) => {
                let socket =
                    WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None)
                        .await;
                handler.handle(socket).await;
            }
            Err(error) => {
                tracing::error!(%error, "websocket upgrade failed after handshake");
            }
        }
    });

    let mut handshake = Response::new(Body::empty());
    *handshake.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    *handshake.headers_mut() = headers;
    Some(handshake)
}

/// RFC 6455 §4.2.1 request checks.
fn is_websocket_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get(header::CONNECTION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        });
    let upgrade_websocket = headers
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"));
    let version_13 = headers
        .get(header::SEC_WEBSOCKET_VERSION)
        .is_some_and(|value| value == "13");
    connection_upgrade
        && upgrade_websocket
        && version_13
        && headers.contains_key(header::SEC_WEBSOCKET_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopHandler;

    #[async_trait]
    impl UpgradeHandler for NoopHandler {
        async fn handle(self: Box<Self>, _socket: WebSocket) {}
    }

    fn websocket_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive, Upgrade".parse().unwrap());
        headers.insert(header::UPGRADE, "websocket".parse().unwrap());
        headers.insert(header::SEC_WEBSOCKET_VERSION, "13".parse().unwrap());
        headers.insert(
            header::SEC_WEBSOCKET_KEY,
            "dGhlIHNhbXBsZSBub25jZQ==".parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_is_websocket_request() {
        assert!(is_websocket_request(&websocket_headers()));

        let mut missing_key = websocket_headers();
        missing_key.remove(header::SEC_WEBSOCKET_KEY);
        assert!(!is_websocket_request(&missing_key));

        let mut wrong_version = websocket_headers();
        wrong_version.insert(header::SEC_WEBSOCKET_VERSION, "8".parse().unwrap());
        assert!(!is_websocket_request(&wrong_version));
    }

    #[tokio::test]
    async fn test_unmarked_response_passes_through() {
        let mut response = Response::new(Body::empty());
        assert!(attempt(None, &websocket_headers(), &mut response).is_none());
    }

    #[tokio::test]
    async fn test_marked_but_not_upgradable_falls_back() {
        let mut response = Response::new(Body::from("fallback"));
        mark_for_upgrade(&mut response, Box::new(NoopHandler));

        // no OnUpgrade available on this connection
        assert!(attempt(None, &websocket_headers(), &mut response).is_none());
        // association is consumed either way
        assert!(attempt(None, &websocket_headers(), &mut response).is_none());
    }

    #[tokio::test]
    async fn test_marked_but_plain_request_falls_back() {
        let mut response = Response::new(Body::empty());
        mark_for_upgrade(&mut response, Box::new(NoopHandler));
        assert!(attempt(None, &HeaderMap::new(), &mut response).is_none());
    }
}
