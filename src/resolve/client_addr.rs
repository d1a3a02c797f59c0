//! Client address derivation.
//!
//! # Responsibilities
//! - Derive the client's network address per configuration: transport
//!   peer, a verbatim header, or positional x-forwarded-for extraction
//! - Treat an absent or malformed source as "no address", never a guess

use axum::http::header::InvalidHeaderName;
use axum::http::{HeaderMap, HeaderName};

use crate::config::ClientAddrConfig;

/// Where the client address comes from.
enum Mode {
    /// Transport peer address (none on unix sockets).
    Peer,

    /// Entry counted from the end of the x-forwarded-for list.
    ForwardedFor { depth: u32 },

    /// Verbatim value of a configured header.
    Header(HeaderName),
}

/// Resolves a client address for each request.
pub struct ClientAddrResolver {
    mode: Mode,
}

impl ClientAddrResolver {
    pub fn from_config(config: &ClientAddrConfig) -> Result<Self, InvalidHeaderName> {
        let mode = match config.ip_header.as_deref() {
            None => Mode::Peer,
            Some(name) if name.eq_ignore_ascii_case("x-forwarded-for") => Mode::ForwardedFor {
                depth: config.xff_depth,
            },
            Some(name) => Mode::Header(name.parse()?),
        };
        Ok(Self { mode })
    }

    /// Derive the address from the request headers, falling back to the
    /// transport peer when the configured header yields nothing.
    pub fn resolve(&self, headers: &HeaderMap, peer: Option<String>) -> Option<String> {
        match &self.mode {
            Mode::Peer => peer,
            Mode::ForwardedFor { depth } => headers
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| forwarded_for_at(value, *depth))
                .or(peer),
            Mode::Header(name) => headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
                .or(peer),
        }
    }
}

/// Pick the entry `depth` positions from the end of a comma-separated
/// x-forwarded-for value (1 = last entry).
fn forwarded_for_at(value: &str, depth: u32) -> Option<String> {
    let entries: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect();
    let position = entries.len().checked_sub(depth as usize)?;
    entries.get(position).map(|entry| entry.to_string())
}
