//! # Pipeline Module
//!
//! Composes an ordered list of middleware into a single request delegate.
//!
//! ## Shape
//!
//! Each stage receives the exchange and the *next* delegate. A stage may do
//! work before calling `next`, after it returns, or not call it at all
//! (short-circuit). For stages registered `[A, B, C]` the observable order is
//! `A-pre, B-pre, C-pre, terminal, C-post, B-post, A-post`.
//!
//! The terminal delegate answers 404 if nothing has started the response.
//!
//! ```rust
//! use brrtdispatch::pipeline::PipelineBuilder;
//! use brrtdispatch::server::{ExchangeContext, Request};
//! use http::{Method, StatusCode};
//!
//! let mut builder = PipelineBuilder::new();
//! builder.use_fn(|ctx, next| {
//!     ctx.response.insert_header("x-stage", "outer")?;
//!     next(ctx)
//! });
//! let pipeline = builder.build();
//!
//! let mut ctx = ExchangeContext::new(Request::new(Method::GET, "/"));
//! pipeline.run(&mut ctx).unwrap();
//! assert_eq!(ctx.response.status(), StatusCode::NOT_FOUND);
//! assert_eq!(ctx.response.header("x-stage"), Some("outer"));
//! ```

mod core;

pub use core::{Pipeline, PipelineBuilder, RequestDelegate, Transform};
