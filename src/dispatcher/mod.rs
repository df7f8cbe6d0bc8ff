//! # Dispatcher Module
//!
//! The action side of dispatch: what a controller action is, how its
//! parameters are bound, and how it is invoked.
//!
//! ## Startup
//!
//! Controllers implement [`Controller`]; `actions()` returns one
//! [`ActionDescriptor`] per action, built with [`ActionBuilder`]. The scan
//! runs once when the app is built. Nothing is inspected per request.
//!
//! ## Per request
//!
//! [`ActionInvoker::invoke`]:
//!
//! 1. resolves the controller from the request scope, or constructs it from
//!    its dependencies ([`Controller::construct`])
//! 2. binds parameters with [`ParameterBinder`] (hint, then route value, then
//!    query value, then the type's fallback)
//! 3. calls the action, catching panics; a [`Deferred`] outcome is awaited on
//!    its own coroutine and abandoned if the exchange is cancelled
//! 4. executes the returned [`crate::results::ActionReturn`]
//!
//! ## Stack size
//!
//! Deferred completions run on coroutines sized by
//! [`crate::runtime_config::RuntimeConfig::stack_size`] (`BRRTD_STACK_SIZE`,
//! 64 KB by default).

mod binding;
mod core;
mod deferred;
mod descriptor;

pub use binding::{Arguments, BindingHint, ParamValue, ParameterBinder, ParameterSpec, BODY_KEY};
pub use core::ActionInvoker;
pub use deferred::Deferred;
pub use descriptor::{ActionBuilder, ActionDescriptor, ActionOutcome, Controller};
