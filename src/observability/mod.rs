//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatch handler and resolvers produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber (env-filter controlled)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log events
//! - Metrics are cheap atomic updates, labeled by method, status and
//!   the resolver stage that produced the response

pub mod logging;
pub mod metrics;
