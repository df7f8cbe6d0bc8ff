//! # Results Module
//!
//! Turns what an action returned into status, headers and body.
//!
//! | Kind | Status | Body |
//! |---|---|---|
//! | [`ActionResult::Ok`] | 200 | none |
//! | [`ActionResult::OkValue`] | 200 | JSON value |
//! | [`ActionResult::Created`] | 201 | JSON value + `Location` |
//! | [`ActionResult::NoContent`] | 204 | none |
//! | [`ActionResult::BadRequest`] | 400 | none or JSON error |
//! | [`ActionResult::NotFound`] | 404 | none or JSON value |
//! | [`ActionResult::Conflict`] | 409 | JSON error |
//! | [`ActionResult::Redirect`] | 302 | `Location` only |
//!
//! Anything else an action returns is an [`ActionReturn`]: a bare value is
//! written as a 200 JSON document at the root (no envelope), a null as 204,
//! and [`ActionReturn::Custom`] runs a caller-supplied [`ResultExecutor`].

use std::fmt;

use http::header::LOCATION;
use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::DispatchError;
use crate::server::ExchangeContext;

/// Writes one result kind into the exchange.
pub trait ResultExecutor: Send {
    /// # Errors
    ///
    /// Response discipline or serialization failures.
    fn execute(self: Box<Self>, ctx: &mut ExchangeContext) -> Result<(), DispatchError>;
}

/// The built-in result kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionResult {
    Ok,
    OkValue(Value),
    Created { location: String, value: Value },
    NoContent,
    BadRequest(Option<Value>),
    NotFound(Option<Value>),
    Conflict(Value),
    Redirect { location: String },
}

impl ActionResult {
    /// # Errors
    ///
    /// When `value` cannot be represented as JSON.
    pub fn ok_value<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::OkValue(serde_json::to_value(value)?))
    }

    /// # Errors
    ///
    /// When `value` cannot be represented as JSON.
    pub fn created<T: Serialize + ?Sized>(
        location: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::Created {
            location: location.into(),
            value: serde_json::to_value(value)?,
        })
    }

    /// # Errors
    ///
    /// When `error` cannot be represented as JSON.
    pub fn bad_request<T: Serialize + ?Sized>(error: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::BadRequest(Some(serde_json::to_value(error)?)))
    }

    /// # Errors
    ///
    /// When `value` cannot be represented as JSON.
    pub fn not_found<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::NotFound(Some(serde_json::to_value(value)?)))
    }

    /// # Errors
    ///
    /// When `error` cannot be represented as JSON.
    pub fn conflict<T: Serialize + ?Sized>(error: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::Conflict(serde_json::to_value(error)?))
    }

    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Ok | Self::OkValue(_) => StatusCode::OK,
            Self::Created { .. } => StatusCode::CREATED,
            Self::NoContent => StatusCode::NO_CONTENT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Redirect { .. } => StatusCode::FOUND,
        }
    }

    /// Write status, headers and body.
    ///
    /// # Errors
    ///
    /// Fails if the response has already started or the body cannot be serialized.
    pub fn write_to(self, ctx: &mut ExchangeContext) -> Result<(), DispatchError> {
        let response = &mut ctx.response;
        response.set_status(self.status())?;
        match self {
            Self::Ok | Self::NoContent | Self::BadRequest(None) | Self::NotFound(None) => Ok(()),
            Self::OkValue(value)
            | Self::BadRequest(Some(value))
            | Self::NotFound(Some(value))
            | Self::Conflict(value) => response.write_json(&value),
            Self::Created { location, value } => {
                response.insert_header(LOCATION.as_str(), &location)?;
                response.write_json(&value)
            }
            Self::Redirect { location } => {
                response.insert_header(LOCATION.as_str(), &location)?;
                Ok(())
            }
        }
    }
}

impl ResultExecutor for ActionResult {
    fn execute(self: Box<Self>, ctx: &mut ExchangeContext) -> Result<(), DispatchError> {
        (*self).write_to(ctx)
    }
}

/// Everything an action may return.
pub enum ActionReturn {
    Result(ActionResult),
    /// Serialized as the 200 body; `Value::Null` is treated as [`ActionReturn::Null`].
    Value(Value),
    /// Nothing to return: 204.
    Null,
    Custom(Box<dyn ResultExecutor>),
}

impl ActionReturn {
    /// # Errors
    ///
    /// When `value` cannot be represented as JSON.
    pub fn value<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::Value(serde_json::to_value(value)?))
    }

    pub fn custom<E: ResultExecutor + 'static>(executor: E) -> Self {
        Self::Custom(Box::new(executor))
    }

    /// # Errors
    ///
    /// Whatever the selected executor returns.
    pub fn execute(self, ctx: &mut ExchangeContext) -> Result<(), DispatchError> {
        match self {
            Self::Result(result) => result.write_to(ctx),
            Self::Value(Value::Null) | Self::Null => ActionResult::NoContent.write_to(ctx),
            Self::Value(value) => ActionResult::OkValue(value).write_to(ctx),
            Self::Custom(executor) => executor.execute(ctx),
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Result(_) => "result",
            Self::Value(Value::Null) | Self::Null => "null",
            Self::Value(_) => "value",
            Self::Custom(_) => "custom",
        }
    }
}

impl From<ActionResult> for ActionReturn {
    fn from(result: ActionResult) -> Self {
        Self::Result(result)
    }
}

impl From<Value> for ActionReturn {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for ActionReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Result(result) => f.debug_tuple("Result").field(result).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Null => f.write_str("Null"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}
