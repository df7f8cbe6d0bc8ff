use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom};

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use tracing::debug;

use crate::error::ResponseError;

/// The inbound half of an exchange.
///
/// Immutable once constructed, except for the read position of the body.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query_string: Option<String>,
    query: QueryParams,
    headers: HeaderMap,
    body: RequestBody,
}

impl Request {
    /// Build a request from a method and a request target (`/path?query`).
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query_string) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        let path = if path.is_empty() { "/" } else { path };
        let query = query_string
            .as_deref()
            .map(QueryParams::parse)
            .unwrap_or_default();
        Self {
            method,
            path: path.to_string(),
            query_string,
            query,
            headers: HeaderMap::new(),
            body: RequestBody::empty(),
        }
    }

    /// Append a header (builder style).
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::InvalidHeader`] for an invalid name or value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, ResponseError> {
        let (name, value) = header_pair(name, value)?;
        self.headers.append(name, value);
        Ok(self)
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    #[must_use]
    pub fn query(&self) -> &QueryParams {
        &self.query
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

    pub fn body_mut(&mut self) -> &mut RequestBody {
        &mut self.body
    }
}

/// Decoded query-string pairs in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse an `application/x-www-form-urlencoded` query string.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        debug!(param_count = pairs.len(), "Query params parsed");
        Self { pairs }
    }

    /// Value for `name` (case-insensitive).
    ///
    /// Uses "last write wins" semantics: for `?limit=10&limit=20` this returns `20`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rfind(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Request body: an in-memory seekable buffer, or a one-shot stream from the transport.
pub enum RequestBody {
    Buffered(Cursor<Vec<u8>>),
    Stream(Box<dyn Read + Send>),
}

impl RequestBody {
    #[must_use]
    pub fn empty() -> Self {
        Self::Buffered(Cursor::new(Vec::new()))
    }

    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Buffered(Cursor::new(bytes.into()))
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self::Stream(Box::new(reader))
    }

    #[must_use]
    pub fn is_seekable(&self) -> bool {
        matches!(self, Self::Buffered(_))
    }

    /// Read the whole body without consuming it.
    ///
    /// A buffered body is read from the start and its position restored
    /// afterwards. A stream is drained once into a buffer that replaces it,
    /// so later readers see the same bytes.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from the underlying stream.
    pub fn read_all_preserving(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Self::Buffered(cursor) => {
                let position = cursor.stream_position()?;
                cursor.seek(SeekFrom::Start(0))?;
                let mut bytes = Vec::with_capacity(cursor.get_ref().len());
                cursor.read_to_end(&mut bytes)?;
                cursor.seek(SeekFrom::Start(position))?;
                Ok(bytes)
            }
            Self::Stream(reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                *self = Self::Buffered(Cursor::new(bytes.clone()));
                Ok(bytes)
            }
        }
    }
}

impl Default for RequestBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl Read for RequestBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Buffered(cursor) => cursor.read(buf),
            Self::Stream(reader) => reader.read(buf),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(cursor) => f
                .debug_struct("Buffered")
                .field("len", &cursor.get_ref().len())
                .field("position", &cursor.position())
                .finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

pub(crate) fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ResponseError> {
    let invalid = || ResponseError::InvalidHeader {
        name: name.to_string(),
    };
    let name_parsed = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
    let value_parsed = HeaderValue::from_str(value).map_err(|_| invalid())?;
    Ok((name_parsed, value_parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_split_into_path_and_query() {
        let req = Request::new(Method::GET, "/p?x=1&y=a%20b");
        assert_eq!(req.path(), "/p");
        assert_eq!(req.query_string(), Some("x=1&y=a%20b"));
        assert_eq!(req.query().get("X"), Some("1"));
        assert_eq!(req.query().get("y"), Some("a b"));
    }

    #[test]
    fn query_last_write_wins() {
        let q = QueryParams::parse("limit=10&limit=20");
        assert_eq!(q.get("limit"), Some("20"));
        assert_eq!(q.get_all("limit").collect::<Vec<_>>(), vec!["10", "20"]);
    }

    #[test]
    fn buffered_body_position_is_restored() {
        let mut body = RequestBody::from_bytes(b"hello".to_vec());
        let mut first = [0u8; 2];
        body.read_exact(&mut first).unwrap();
        assert_eq!(body.read_all_preserving().unwrap(), b"hello");
        let mut rest = String::new();
        body.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "llo");
    }

    #[test]
    fn stream_body_can_be_read_twice() {
        let mut body = RequestBody::from_reader(Cursor::new(b"{\"a\":1}".to_vec()));
        assert!(!body.is_seekable());
        assert_eq!(body.read_all_preserving().unwrap(), b"{\"a\":1}");
        assert!(body.is_seekable());
        assert_eq!(body.read_all_preserving().unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::new(Method::GET, "/")
            .with_header("X-Trace", "abc")
            .unwrap();
        assert_eq!(req.header("x-trace"), Some("abc"));
        assert!(Request::new(Method::GET, "/").with_header("bad header", "v").is_err());
    }
}
