use http::header::{self, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::Serialize;

use super::request::header_pair;
use crate::error::{DispatchError, ResponseError};
use crate::ids::REQUEST_ID_HEADER;

/// Content type used for every structured (JSON) body the engine writes.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Body message for every engine-generated 500.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

/// The outbound half of an exchange.
///
/// Status defaults to 200. Once the response has started (first body byte
/// written, or [`Response::start`] called) status and headers are frozen and
/// every attempt to change them returns [`ResponseError::AlreadyStarted`].
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    started: bool,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            started: false,
        }
    }
}

impl Response {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// # Errors
    ///
    /// [`ResponseError::AlreadyStarted`] once the body has started.
    pub fn set_status(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.ensure_not_started()?;
        self.status = status;
        Ok(())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if it is valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Replace every value of `name` with `value`.
    ///
    /// # Errors
    ///
    /// Fails once started, or for an invalid header name/value.
    pub fn insert_header(&mut self, name: &str, value: &str) -> Result<(), ResponseError> {
        self.ensure_not_started()?;
        let (name, value) = header_pair(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Add `value` to `name`, keeping existing values.
    ///
    /// # Errors
    ///
    /// Fails once started, or for an invalid header name/value.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), ResponseError> {
        self.ensure_not_started()?;
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(())
    }

    #[must_use]
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Freeze status and headers without writing a body.
    pub fn start(&mut self) {
        self.started = true;
    }

    /// Append bytes to the body, starting the response.
    pub fn write(&mut self, bytes: &[u8]) {
        self.started = true;
        self.body.extend_from_slice(bytes);
    }

    /// Serialize `value` as the JSON body and set the content type.
    ///
    /// # Errors
    ///
    /// Fails if the response has started or `value` cannot be serialized.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), DispatchError> {
        self.ensure_not_started()?;
        let bytes = serde_json::to_vec(value)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        self.write(&bytes);
        Ok(())
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Reset to a fresh 200 with no headers or body.
    ///
    /// # Errors
    ///
    /// [`ResponseError::AlreadyStarted`] once the body has started.
    pub fn clear(&mut self) -> Result<(), ResponseError> {
        self.ensure_not_started()?;
        *self = Self::default();
        Ok(())
    }

    /// Reset like [`Response::clear`], keeping the request id header.
    pub(crate) fn reset_for_error(&mut self) -> Result<(), ResponseError> {
        self.ensure_not_started()?;
        let request_id = self.headers.remove(REQUEST_ID_HEADER);
        *self = Self::default();
        if let Some(value) = request_id {
            self.headers.insert(REQUEST_ID_HEADER, value);
        }
        Ok(())
    }

    #[must_use]
    pub fn into_parts(self) -> ResponseParts {
        ResponseParts {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }

    /// Replace any pending state with the generic 500 JSON body.
    ///
    /// A no-op once the response has started; the partial response stands.
    pub(crate) fn internal_error(&mut self) -> Result<(), DispatchError> {
        if self.started {
            return Ok(());
        }
        self.reset_for_error()?;
        self.status = StatusCode::INTERNAL_SERVER_ERROR;
        self.write_json(&serde_json::json!({ "error": INTERNAL_ERROR_MESSAGE }))
    }

    fn ensure_not_started(&self) -> Result<(), ResponseError> {
        if self.started {
            Err(ResponseError::AlreadyStarted)
        } else {
            Ok(())
        }
    }
}

/// Final response state handed back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParts {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ResponseParts {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the parse error for an empty or non-JSON body.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}
