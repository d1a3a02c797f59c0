//! HTTP host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP / unix socket connection
//!     → server.rs (Axum setup, timeout + trace + request-id layers)
//!     → dispatch handler (peer address, resolver chain)
//!     → response, or a live upgraded connection
//! ```

pub mod request;
pub mod server;

pub use request::{RequestIdLayer, X_REQUEST_ID};
pub use server::{HttpServer, ServerHandle};
