//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     ServerHandle::shutdown() or SIGINT
//!     → broadcast to the serve loop
//!     → stop accepting, drain in-flight dispatches, exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
