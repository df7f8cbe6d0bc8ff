//! Error types shared across the dispatch engine.
//!
//! Only two of these ever reach the transport boundary: [`DispatchError`] from the
//! pipeline, and panics caught by [`crate::server::AppService`]. Pattern errors are
//! raised at registration time and construction errors are answered inside the
//! invoker with a generic 500.

use std::any::Any;

use thiserror::Error;

/// Errors produced while running one exchange through the pipeline.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The action body returned an error.
    #[error("action '{action}' failed: {source}")]
    Handler {
        action: String,
        #[source]
        source: anyhow::Error,
    },
    /// The action body panicked, either inline or inside a deferred coroutine.
    #[error("action '{action}' panicked: {message}")]
    HandlerPanicked { action: String, message: String },
    /// The exchange was cancelled (client went away) while work was pending.
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error("failed to serialize response body: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A handler instance or one of its dependencies could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("no service registered for {type_name}")]
    Unresolved { type_name: &'static str },
    #[error("resolved service is not a {type_name}")]
    TypeMismatch { type_name: &'static str },
    #[error("failed to construct {type_name}: {reason}")]
    Failed {
        type_name: &'static str,
        reason: String,
    },
}

/// Rejected route pattern. Returned by `RoutePattern::parse` and the registration calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("catch-all parameter '{name}' must be the last segment of '{pattern}'")]
    CatchAllNotLast { pattern: String, name: String },
    #[error("empty parameter name in '{pattern}'")]
    EmptyParameterName { pattern: String },
    #[error("unterminated parameter segment '{segment}' in '{pattern}'")]
    UnterminatedParameter { pattern: String, segment: String },
    #[error("parameter '{name}' appears more than once in '{pattern}'")]
    DuplicateParameter { pattern: String, name: String },
}

/// Violations of the response write discipline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    /// Status and headers are frozen once the first body byte is written.
    #[error("response has already started; status and headers are immutable")]
    AlreadyStarted,
    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
