//! # Server Module
//!
//! The exchange model and the boundary to the transport.
//!
//! - [`Request`], [`Response`], [`ExchangeContext`] - one request/response pair
//! - [`AppService`] - the single `handle` entry point; always leaves a status
//! - [`Host`] - accept loop over an [`ExchangeSource`], one coroutine per exchange
//! - [`channel`] - in-memory source for embedding and tests

mod channel;
mod context;
mod host;
mod properties;
mod request;
mod response;
mod service;

pub use channel::{channel, ChannelSource, ExchangeSender, PendingResponse};
pub use context::{ExchangeContext, ROUTE_VALUES_KEY};
pub use host::{ExchangeSource, Host, Incoming, Responder, ServerHandle};
pub use properties::Properties;
pub use request::{QueryParams, Request, RequestBody};
pub use response::{Response, ResponseParts, INTERNAL_ERROR_MESSAGE, JSON_CONTENT_TYPE};
pub use service::AppService;
