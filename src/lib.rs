//! SSR gateway library.
//!
//! A request-serving layer in front of a server-side-rendered
//! application: per request it rewrites the effective origin, serves
//! static assets from a precomputed index, or hands off to an external
//! renderer, and mediates WebSocket upgrades of renderer responses.

pub mod assets;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod renderer;
pub mod resolve;
pub mod upgrade;

pub use config::GatewayConfig;
pub use http::{HttpServer, ServerHandle};
pub use renderer::{RenderError, Renderer, RequestEvent, StaticSiteRenderer};
pub use resolve::ResolverChain;
pub use upgrade::{UpgradeHandler, WebSocket};
