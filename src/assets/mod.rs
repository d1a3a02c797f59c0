//! Static asset subsystem.
//!
//! # Data Flow
//! ```text
//! root directory
//!     → index.rs (one-time walk, precomputed headers)   [production]
//!     → responder.rs (per-request lookup & probe)       [dev probes disk]
//!     → encoding-aware candidate resolution
//!     → conditional GET / range handling
//!     → Response
//! ```
//!
//! # Design Decisions
//! - Production index is built once and never mutated; concurrent
//!   requests share it read-only
//! - Dev mode trades latency for freshness: every lookup stats the disk
//!   and refuses anything outside the root
//! - Cached header sets are cloned per response, never mutated in place
//! - The content-type table is owned by the server, not global state

pub mod index;
pub mod mime;
pub mod responder;

use std::sync::Arc;

use axum::http::HeaderMap;

pub use index::{FileEntry, StaticIndex};
pub use mime::MimeTable;
pub use responder::StaticServer;

/// Per-root customization of response headers, keyed by request path.
pub type HeaderHook = Arc<dyn Fn(&mut HeaderMap, &str) + Send + Sync>;

/// Options controlling how a root directory is indexed and served.
#[derive(Debug, Clone)]
pub struct StaticOptions {
    /// Probe the filesystem per lookup instead of indexing at startup.
    pub dev: bool,

    /// Emit weak ETags and honor If-None-Match.
    pub etag: bool,

    /// Offer `.gz` variants to clients accepting gzip.
    pub gzip: bool,

    /// Offer `.br` variants to clients accepting brotli.
    pub brotli: bool,

    /// Serve dotfiles (".well-known" is always served).
    pub dot_files: bool,

    /// Extensions tried when resolving extensionless paths.
    pub extensions: Vec<String>,

    /// Cache-Control max-age in seconds for indexed files.
    pub max_age: Option<u64>,

    /// Append `immutable` to the Cache-Control above.
    pub immutable: bool,
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            dev: false,
            etag: true,
            gzip: true,
            brotli: true,
            dot_files: false,
            extensions: vec!["html".to_string(), "htm".to_string()],
            max_age: None,
            immutable: false,
        }
    }
}

impl StaticOptions {
    /// Cache-Control value applied to indexed entries, if any.
    pub(crate) fn cache_control(&self) -> Option<String> {
        let max_age = self.max_age?;
        let mut cc = format!("public,max-age={}", max_age);
        if self.immutable {
            cc.push_str(",immutable");
        } else if max_age == 0 {
            cc.push_str(",must-revalidate");
        }
        Some(cc)
    }
}
