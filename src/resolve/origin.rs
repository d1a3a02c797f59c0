//! Request origin rewriting.
//!
//! # Responsibilities
//! - Rewrite a request URI to a fixed configured origin
//! - Rewrite scheme and authority from configured forwarding headers
//! - Preserve the path and query through every rewrite

use axum::http::{header, HeaderMap, HeaderName, Uri};
use url::Url;

/// Rewrite `uri` so its scheme and authority come from `origin`,
/// keeping the path and query. A URI that somehow cannot be rebuilt is
/// returned unchanged.
pub fn override_origin(uri: &Uri, origin: &Url) -> Uri {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Uri::builder()
        .scheme(origin.scheme())
        .authority(origin.authority())
        .path_and_query(path_and_query)
        .build()
        .unwrap_or_else(|_| uri.clone())
}

/// Rewrite the components named by the configured forwarding headers.
///
/// Returns `None` when neither header is present on the request, which
/// leaves the URI untouched. Origin-form request URIs get their missing
/// authority from the `Host` header and default to the http scheme.
pub fn header_origin(
    uri: &Uri,
    headers: &HeaderMap,
    host: Option<&HeaderName>,
    protocol: Option<&HeaderName>,
) -> Option<Uri> {
    let host_value = header_str(headers, host);
    let protocol_value = header_str(headers, protocol);
    if host_value.is_none() && protocol_value.is_none() {
        return None;
    }

    let scheme = protocol_value
        .or(uri.scheme_str())
        .unwrap_or("http")
        .to_string();
    let authority = host_value
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })?;
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Uri::builder()
        .scheme(scheme.as_str())
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
        .ok()
}

fn header_str<'a>(headers: &'a HeaderMap, name: Option<&HeaderName>) -> Option<&'a str> {
    headers.get(name?).and_then(|value| value.to_str().ok())
}
