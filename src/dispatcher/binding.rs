//! Parameter binding: route values, query string, body, explicit hints.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::server::ExchangeContext;

/// Properties key under which the parsed request body is cached for the exchange.
pub const BODY_KEY: &str = "brrtdispatch.body";

/// Conversion from a route or query string value.
///
/// Parsing is culture-invariant. `fallback` is what a parameter receives when
/// the value is missing or does not parse: value types return their default,
/// reference-like types (`String`) return `None` and stay unbound.
pub trait ParamValue: Sized + Send + 'static {
    fn parse_invariant(raw: &str) -> Option<Self>;

    fn fallback() -> Option<Self>;
}

macro_rules! impl_param_value_fromstr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ParamValue for $ty {
                fn parse_invariant(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }

                fn fallback() -> Option<Self> {
                    Some(<$ty>::default())
                }
            }
        )*
    };
}

impl_param_value_fromstr!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl ParamValue for bool {
    fn parse_invariant(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }

    fn fallback() -> Option<Self> {
        Some(false)
    }
}

impl ParamValue for char {
    fn parse_invariant(raw: &str) -> Option<Self> {
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    fn fallback() -> Option<Self> {
        Some('\0')
    }
}

impl ParamValue for String {
    fn parse_invariant(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }

    fn fallback() -> Option<Self> {
        None
    }
}

impl ParamValue for NaiveDate {
    fn parse_invariant(raw: &str) -> Option<Self> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
    }

    fn fallback() -> Option<Self> {
        Some(NaiveDate::default())
    }
}

impl ParamValue for NaiveDateTime {
    fn parse_invariant(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .or_else(|| NaiveDate::parse_invariant(raw).map(|d| d.and_time(NaiveTime::MIN)))
    }

    fn fallback() -> Option<Self> {
        Some(NaiveDateTime::default())
    }
}

impl ParamValue for DateTime<Utc> {
    fn parse_invariant(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| NaiveDateTime::parse_invariant(raw).map(|naive| naive.and_utc()))
    }

    fn fallback() -> Option<Self> {
        Some(DateTime::<Utc>::default())
    }
}

impl<T: ParamValue> ParamValue for Option<T> {
    fn parse_invariant(raw: &str) -> Option<Self> {
        Some(T::parse_invariant(raw))
    }

    fn fallback() -> Option<Self> {
        Some(None)
    }
}

/// Explicit source for one parameter. Always wins over name-based lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingHint {
    /// Deserialize the whole request body into the parameter.
    Body,
    /// Route value with the given name.
    Route(Arc<str>),
    /// Query-string value with the given name.
    Query(Arc<str>),
}

type BoxedArg = Box<dyn Any + Send>;

#[derive(Clone, Copy)]
enum Converter {
    Text(fn(Option<&str>) -> Option<BoxedArg>),
    Body {
        convert: fn(&Value) -> Option<BoxedArg>,
        /// Used when the body is missing or does not deserialize.
        fallback: fn() -> Option<BoxedArg>,
    },
}

/// One declared action parameter.
#[derive(Clone)]
pub struct ParameterSpec {
    name: Arc<str>,
    hint: Option<BindingHint>,
    type_name: &'static str,
    converter: Converter,
}

impl ParameterSpec {
    /// A string-convertible parameter, optionally pinned to a route or query key.
    #[must_use]
    pub fn value<T: ParamValue>(name: &str, hint: Option<BindingHint>) -> Self {
        Self {
            name: Arc::from(name),
            hint,
            type_name: type_name::<T>(),
            converter: Converter::Text(convert_text::<T>),
        }
    }

    /// A parameter deserialized from the request body. Left unbound when the
    /// body is missing or does not deserialize.
    #[must_use]
    pub fn body<T>(name: &str) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        Self {
            name: Arc::from(name),
            hint: Some(BindingHint::Body),
            type_name: type_name::<T>(),
            converter: Converter::Body {
                convert: convert_body::<T>,
                fallback: unbound,
            },
        }
    }

    /// Like [`ParameterSpec::body`], but binds `T::default()` when the body
    /// is missing or does not deserialize.
    #[must_use]
    pub fn body_or_default<T>(name: &str) -> Self
    where
        T: DeserializeOwned + Default + Send + 'static,
    {
        Self {
            name: Arc::from(name),
            hint: Some(BindingHint::Body),
            type_name: type_name::<T>(),
            converter: Converter::Body {
                convert: convert_body::<T>,
                fallback: default_value::<T>,
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn hint(&self) -> Option<&BindingHint> {
        self.hint.as_ref()
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for ParameterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterSpec")
            .field("name", &self.name)
            .field("hint", &self.hint)
            .field("type", &self.type_name)
            .finish()
    }
}

fn convert_text<T: ParamValue>(raw: Option<&str>) -> Option<BoxedArg> {
    let value = match raw {
        Some(raw) => T::parse_invariant(raw).or_else(T::fallback),
        None => T::fallback(),
    };
    value.map(|v| Box::new(v) as BoxedArg)
}

fn convert_body<T>(document: &Value) -> Option<BoxedArg>
where
    T: DeserializeOwned + Send + 'static,
{
    T::deserialize(document)
        .ok()
        .map(|v| Box::new(v) as BoxedArg)
}

fn unbound() -> Option<BoxedArg> {
    None
}

fn default_value<T: Default + Send + 'static>() -> Option<BoxedArg> {
    Some(Box::new(T::default()))
}

/// Bound arguments for one invocation, in declaration order.
#[derive(Default)]
pub struct Arguments {
    values: Vec<(Arc<str>, Option<BoxedArg>)>,
}

impl Arguments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Any + Send>(&mut self, name: &str, value: Option<T>) {
        self.push_boxed(Arc::from(name), value.map(|v| Box::new(v) as BoxedArg));
    }

    fn push_boxed(&mut self, name: Arc<str>, value: Option<BoxedArg>) {
        self.values.push((name, value));
    }

    fn slot(&self, name: &str) -> Option<&Option<BoxedArg>> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Borrow a bound value. `None` when unbound or of another type.
    #[must_use]
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.slot(name)?.as_ref()?.downcast_ref::<T>()
    }

    /// Move a bound value out, leaving the parameter unbound.
    pub fn take<T: Any>(&mut self, name: &str) -> Option<T> {
        let slot = self
            .values
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)?;
        if !slot.as_ref()?.is::<T>() {
            return None;
        }
        slot.take()?.downcast::<T>().ok().map(|b| *b)
    }

    /// Clone of a bound value, or `T::default()`.
    #[must_use]
    pub fn get_or_default<T: Any + Clone + Default>(&self, name: &str) -> T {
        self.get::<T>(name).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        matches!(self.slot(name), Some(Some(_)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.iter().map(|(k, v)| (k, v.is_some())))
            .finish()
    }
}

/// Binds declared parameters against one exchange.
///
/// Precedence per parameter: explicit hint, then route value by name, then
/// query value by name, then the type's fallback. Conversion failures never
/// fail the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterBinder;

impl ParameterBinder {
    pub fn bind(parameters: &[ParameterSpec], ctx: &mut ExchangeContext) -> Arguments {
        let mut arguments = Arguments::new();
        for spec in parameters {
            let value = match (spec.converter, &spec.hint) {
                (Converter::Body { convert, fallback }, _) => body_document(ctx)
                    .and_then(|document| convert(&document))
                    .or_else(fallback),
                (Converter::Text(convert), Some(BindingHint::Route(key))) => {
                    convert(ctx.route_value(key))
                }
                (Converter::Text(convert), Some(BindingHint::Query(key))) => {
                    convert(ctx.request.query().get(key))
                }
                (Converter::Text(convert), Some(BindingHint::Body)) => {
                    let text = body_document(ctx).and_then(|document| match document {
                        Value::String(s) => Some(s),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    });
                    convert(text.as_deref())
                }
                (Converter::Text(convert), None) => {
                    let raw = ctx
                        .route_value(&spec.name)
                        .or_else(|| ctx.request.query().get(&spec.name));
                    convert(raw)
                }
            };
            if value.is_none() {
                debug!(
                    parameter = %spec.name,
                    parameter_type = spec.type_name,
                    "Parameter left unbound"
                );
            }
            arguments.push_boxed(Arc::clone(&spec.name), value);
        }
        arguments
    }
}

/// The request body parsed as JSON, read at most once per exchange.
///
/// The body position is preserved so other readers can still consume it.
fn body_document(ctx: &mut ExchangeContext) -> Option<Value> {
    if let Some(cached) = ctx.properties.get::<Option<Value>>(BODY_KEY) {
        return cached.clone();
    }
    let document = match ctx.request.body_mut().read_all_preserving() {
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(document) => Some(document),
            Err(e) => {
                debug!(error = %e, "Request body is not valid JSON");
                None
            }
        },
        Err(e) => {
            debug!(error = %e, "Failed to read request body");
            None
        }
    };
    ctx.properties.insert(BODY_KEY, document.clone());
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{Request, RequestBody};
    use http::Method;

    #[test]
    fn invariant_parsing() {
        assert_eq!(i32::parse_invariant(" 42 "), Some(42));
        assert_eq!(f64::parse_invariant("1.5"), Some(1.5));
        assert_eq!(f64::parse_invariant("1,5"), None);
        assert_eq!(bool::parse_invariant("TRUE"), Some(true));
        assert_eq!(bool::parse_invariant("yes"), None);
        assert_eq!(char::parse_invariant("ab"), None);
        assert_eq!(
            NaiveDate::parse_invariant("2024-02-29"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        let utc = DateTime::<Utc>::parse_invariant("2024-01-01T10:00:00+02:00").unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-01-01T08:00:00+00:00");
    }

    #[test]
    fn value_types_fall_back_to_default() {
        let boxed = convert_text::<i64>(Some("abc")).unwrap();
        assert_eq!(*boxed.downcast::<i64>().unwrap(), 0);
        let date = convert_text::<NaiveDate>(None).unwrap();
        assert_eq!(
            *date.downcast::<NaiveDate>().unwrap(),
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
        );
        assert!(convert_text::<String>(None).is_none());
        let opt = convert_text::<Option<u8>>(Some("300")).unwrap();
        assert_eq!(*opt.downcast::<Option<u8>>().unwrap(), None);
    }

    #[test]
    fn body_is_read_once_and_preserved() {
        let req = Request::new(Method::POST, "/")
            .with_body(RequestBody::from_bytes(br#"{"n": 3}"#.to_vec()));
        let mut ctx = ExchangeContext::new(req);
        let first = body_document(&mut ctx).unwrap();
        assert_eq!(first["n"], 3);
        assert!(ctx.properties.contains::<Option<Value>>(BODY_KEY));
        let again = ctx.request.body_mut().read_all_preserving().unwrap();
        assert_eq!(again, br#"{"n": 3}"#);
    }

    #[test]
    fn arguments_take_respects_type() {
        let mut args = Arguments::new();
        args.push("id", Some(7i64));
        assert_eq!(args.take::<String>("id"), None);
        assert!(args.is_bound("ID"));
        assert_eq!(args.take::<i64>("id"), Some(7));
        assert!(!args.is_bound("id"));
    }

    fn post(target: &str, body: &str) -> ExchangeContext {
        let req = Request::new(Method::POST, target)
            .with_body(RequestBody::from_bytes(body.as_bytes().to_vec()));
        ExchangeContext::new(req)
    }

    #[test]
    fn body_or_default_binds_default_for_bad_body() {
        let specs = [
            ParameterSpec::body::<i64>("plain"),
            ParameterSpec::body_or_default::<i64>("id"),
        ];
        let mut ctx = post("/b/42?id=9", "not json");
        let args = ParameterBinder::bind(&specs, &mut ctx);
        assert!(!args.is_bound("plain"));
        assert_eq!(args.get::<i64>("id"), Some(&0));

        let mut ctx = post("/b/42", "");
        let args = ParameterBinder::bind(&specs, &mut ctx);
        assert_eq!(args.get::<i64>("id"), Some(&0));
    }

    #[test]
    fn body_parameters_share_one_document() {
        #[derive(serde::Deserialize)]
        struct Target {
            target: String,
        }
        let specs = [
            ParameterSpec::body::<Target>("link"),
            ParameterSpec::body::<Value>("raw"),
            ParameterSpec::body_or_default::<i64>("count"),
        ];
        let mut ctx = post("/", r#"{"target": "https://a"}"#);
        let mut args = ParameterBinder::bind(&specs, &mut ctx);
        assert_eq!(args.take::<Target>("link").unwrap().target, "https://a");
        assert_eq!(args.get::<Value>("raw").unwrap()["target"], "https://a");
        assert_eq!(args.get::<i64>("count"), Some(&0));
    }

    #[test]
    fn text_value_with_body_hint_reads_scalar() {
        let specs = [
            ParameterSpec::value::<u32>("n", Some(BindingHint::Body)),
            ParameterSpec::value::<String>("s", Some(BindingHint::Body)),
        ];
        let mut ctx = post("/", "\"17\"");
        let args = ParameterBinder::bind(&specs, &mut ctx);
        assert_eq!(args.get::<u32>("n"), Some(&17));
        assert_eq!(args.get::<String>("s").map(String::as_str), Some("17"));

        let mut ctx = post("/", "[1, 2]");
        let args = ParameterBinder::bind(&specs, &mut ctx);
        assert_eq!(args.get::<u32>("n"), Some(&0));
    }
}
