//! # brrtdispatch
//!
//! **brrtdispatch** is a coroutine-powered request-dispatch engine: it turns one inbound
//! HTTP exchange into exactly one invoked handler, and that handler's result into status,
//! headers and body.
//!
//! ## Architecture
//!
//! - **[`pipeline`]** - ordered middleware composed into one request delegate
//! - **[`router`]** - route patterns (literal, `{param}`, trailing `{*catch_all}`) and the
//!   first-match route table with an optional fallback
//! - **[`dispatcher`]** - controller actions: startup scan, parameter binding from route,
//!   query, body and explicit hints, invocation with deferred completion
//! - **[`results`]** - result kinds and their executors
//! - **[`middleware`]** - routing stage, request tracing, developer diagnostics
//! - **[`server`]** - exchange model, the `AppService` transport boundary, coroutine host
//! - **[`services`]** - boundary to the dependency-resolution container
//! - **[`app`]** - the startup registration surface
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant Service as AppService
//!     participant Pipeline as Middleware Chain
//!     participant Routing as RoutingMiddleware
//!     participant Table as RouteTable
//!     participant Invoker as ActionInvoker
//!     participant Action as Controller Action
//!
//!     Transport->>Service: handle(ExchangeContext)
//!     Service->>Service: create service scope
//!     Service->>Pipeline: run
//!     Pipeline->>Pipeline: Tracing span, diagnostics, custom stages
//!     Pipeline->>Routing: next(ctx)
//!     Routing->>Table: try_match(method, path)
//!
//!     alt No Route and No Fallback
//!         Routing->>Pipeline: next(ctx) -> 404
//!     end
//!
//!     Table-->>Routing: RouteMatch (destination, route values)
//!     Routing->>Invoker: invoke(action, ctx)
//!     Invoker->>Invoker: resolve or construct controller
//!
//!     alt Construction Failure
//!         Invoker-->>Transport: 500 (generic body)
//!     end
//!
//!     Invoker->>Invoker: bind parameters
//!     Invoker->>Action: call
//!     Note over Action: deferred bodies run on<br/>their own may coroutine
//!     Action-->>Invoker: ActionReturn
//!     Invoker->>Invoker: execute result
//!     Pipeline-->>Service: Ok / Err
//!     Service->>Service: Err or panic -> 500 if not started
//!     Service->>Service: dispose scope
//!     Service-->>Transport: ResponseParts
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use brrtdispatch::app::AppBuilder;
//! use brrtdispatch::dispatcher::{ActionDescriptor, Controller};
//! use brrtdispatch::error::ConstructionError;
//! use brrtdispatch::results::{ActionResult, ActionReturn};
//! use brrtdispatch::runtime_config::RuntimeConfig;
//! use brrtdispatch::server::{ExchangeContext, Request};
//! use brrtdispatch::services::Resolver;
//! use http::{Method, StatusCode};
//!
//! struct Links;
//!
//! impl Controller for Links {
//!     fn construct(_: &dyn Resolver) -> Result<Self, ConstructionError> {
//!         Ok(Links)
//!     }
//!
//!     fn actions() -> Vec<ActionDescriptor> {
//!         vec![ActionDescriptor::builder::<Self>("Links.get")
//!             .get()
//!             .route("/api/links/{id}")
//!             .param::<u64>("id")
//!             .handle(|_, args| {
//!                 let id = args.get_or_default::<u64>("id");
//!                 if id == 0 {
//!                     return Ok(ActionResult::NotFound(None).into());
//!                 }
//!                 Ok(ActionReturn::value(&serde_json::json!({ "id": id }))?)
//!             })]
//!     }
//! }
//!
//! let mut app = AppBuilder::new(RuntimeConfig::default());
//! app.use_tracing();
//! app.map_controller::<Links>().unwrap();
//! let service = app.build();
//!
//! let mut ctx = ExchangeContext::new(Request::new(Method::GET, "/api/Links/42"));
//! service.handle(&mut ctx);
//! let response = ctx.into_response();
//! assert_eq!(response.status, StatusCode::OK);
//! assert_eq!(response.json().unwrap()["id"], 42);
//! ```
//!
//! ## Runtime Considerations
//!
//! The engine runs on the `may` coroutine runtime, not tokio or async-std:
//!
//! - [`server::Host`] gives every exchange its own coroutine
//! - deferred actions run on a separate coroutine; waiting for them suspends only the
//!   calling coroutine, and cancelling the exchange cancels the worker
//! - coroutine stack size is configurable via `BRRTD_STACK_SIZE` (default 64 KB)
//!
//! ## Configuration
//!
//! [`runtime_config::RuntimeConfig`] reads `BRRTD_ENV`, `BRRTD_STACK_SIZE` and the
//! `BRRTD_LOG_*` variables, optionally layered over a YAML file:
//!
//! ```yaml
//! environment: development
//! stack_size: 0x20000
//! log:
//!   level: debug
//!   format: pretty
//! ```

pub mod app;
pub mod cancel;
pub mod cli;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod pipeline;
pub mod results;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod services;

pub use app::AppBuilder;
pub use error::{ConstructionError, DispatchError, PatternError, ResponseError};
pub use runtime_config::{Environment, RuntimeConfig};
