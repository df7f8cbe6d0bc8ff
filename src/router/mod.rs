//! # Router Module
//!
//! Maps an HTTP method and path to a registered [`Destination`], extracting
//! route values on the way.
//!
//! ## Overview
//!
//! - [`RoutePattern`] compiles a template such as `/api/links/{id}` or
//!   `/files/{*rest}` and matches one path against it.
//! - [`RouteTable`] keeps routes in registration order, plus at most one
//!   fallback. Lookup walks the routes in order and the **first** match wins;
//!   specificity plays no part. The fallback is used only when no route
//!   matches.
//!
//! ## Example
//!
//! ```rust
//! use brrtdispatch::router::{Destination, RouteTable};
//! use http::Method;
//!
//! let mut table = RouteTable::new();
//! table
//!     .map(Method::GET, "/api/links/{id}", Destination::handler("get_link", |_| Ok(())))
//!     .unwrap();
//!
//! let m = table.try_match(&Method::GET, "/api/Links/42").unwrap();
//! assert_eq!(m.destination.name(), "get_link");
//! assert_eq!(m.route_data.get("id"), Some("42"));
//! ```
//!
//! ## Performance
//!
//! Matching is a linear scan over the routes with no regex and no
//! backtracking; each pattern position maps to exactly one rule. Route values
//! use a `SmallVec` so typical matches do not allocate for the value list.

mod core;
mod pattern;
mod values;
#[cfg(test)]
mod tests;

pub use core::{Destination, RouteDescriptor, RouteMatch, RouteTable};
pub use pattern::RoutePattern;
pub use values::{ParamVec, RouteData, MAX_INLINE_PARAMS};
