//! # Middleware Module
//!
//! Pipeline stages shipped with the engine.
//!
//! - [`RoutingMiddleware`] - matches the route table and runs the destination
//! - [`TracingMiddleware`] - per-request span, request id echo, status/latency
//! - [`DiagnosticsMiddleware`] - developer error page outside production
//!
//! Custom stages implement [`Middleware`], either through the `before`/`after`
//! hooks or by overriding `handle` to wrap the call to `next`.

mod core;
mod diagnostics;
mod routing;
mod tracing;

pub use core::{Flow, Middleware};
pub use diagnostics::DiagnosticsMiddleware;
pub use routing::RoutingMiddleware;
pub use tracing::TracingMiddleware;
