//! Route pattern compilation and matching.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! - literal (`links`) - equal to the path segment, ignoring case
//! - parameter (`{id}`) - any non-empty path segment, bound to `id`
//! - catch-all (`{*rest}`) - final segment only; binds the remainder of the
//!   path (zero or more segments, re-joined with `/`)
//!
//! Leading and trailing separators are ignored on both sides, so `/a/b/`,
//! `a/b` and `/a/b` are the same pattern and the same path. Each pattern
//! position maps to exactly one rule; there is no backtracking.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use super::values::RouteData;
use crate::error::PatternError;

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(Box<str>),
    Param(Arc<str>),
    CatchAll(Arc<str>),
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Compile a pattern such as `/api/links/{id}` or `/files/{*rest}`.
    ///
    /// # Errors
    ///
    /// Rejects empty or unterminated parameter segments (including several
    /// parameters packed into one segment), duplicate parameter names and a
    /// catch-all anywhere but the last position.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let mut segments: Vec<Segment> = Vec::new();
        let parts: Vec<&str> = split_segments(pattern).collect();
        let last = parts.len().saturating_sub(1);

        for (idx, part) in parts.iter().enumerate() {
            let segment = if let Some(inner) = part.strip_prefix('{') {
                // One parameter per segment: `{a}{b}` is not a name.
                let inner = inner
                    .strip_suffix('}')
                    .filter(|inner| !inner.contains(['{', '}']))
                    .ok_or_else(|| PatternError::UnterminatedParameter {
                        pattern: pattern.to_string(),
                        segment: (*part).to_string(),
                    })?;
                let (name, catch_all) = match inner.strip_prefix('*') {
                    Some(name) => (name.trim(), true),
                    None => (inner.trim(), false),
                };
                if name.is_empty() {
                    return Err(PatternError::EmptyParameterName {
                        pattern: pattern.to_string(),
                    });
                }
                if segments.iter().any(|s| match s {
                    Segment::Param(n) | Segment::CatchAll(n) => n.eq_ignore_ascii_case(name),
                    Segment::Literal(_) => false,
                }) {
                    return Err(PatternError::DuplicateParameter {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                if catch_all && idx != last {
                    return Err(PatternError::CatchAllNotLast {
                        pattern: pattern.to_string(),
                        name: name.to_string(),
                    });
                }
                if catch_all {
                    Segment::CatchAll(Arc::from(name))
                } else {
                    Segment::Param(Arc::from(name))
                }
            } else if part.contains('{') || part.contains('}') {
                return Err(PatternError::UnterminatedParameter {
                    pattern: pattern.to_string(),
                    segment: (*part).to_string(),
                });
            } else {
                Segment::Literal((*part).into())
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// The pattern text as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the parameter and catch-all segments, in pattern order.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(n) | Segment::CatchAll(n) => Some(n.as_ref()),
            Segment::Literal(_) => None,
        })
    }

    #[must_use]
    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    /// Match `path` against this pattern, returning the extracted values.
    ///
    /// `path` must not contain the query string.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<RouteData> {
        let parts: SmallVec<[&str; 16]> = split_segments(path).collect();
        let mut values = RouteData::new();

        for (idx, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    let rest = parts
                        .get(idx..)
                        .unwrap_or_default()
                        .iter()
                        .map(|p| decode_segment(p))
                        .collect::<Vec<_>>()
                        .join("/");
                    values.insert(Arc::clone(name), rest);
                    return Some(values);
                }
                Segment::Literal(literal) => {
                    let part = parts.get(idx)?;
                    if !eq_ignore_case(literal, part) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let part = parts.get(idx)?;
                    if part.is_empty() {
                        return None;
                    }
                    values.insert(Arc::clone(name), decode_segment(part).into_owned());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(values)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split on `/` after trimming leading and trailing separators.
/// An empty (or all-separator) input yields no segments.
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.trim_matches(SEPARATOR);
    trimmed
        .split(SEPARATOR)
        .filter(move |_| !trimmed.is_empty())
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        a.eq_ignore_ascii_case(b)
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

/// Percent-decode one path segment; undecodable input is kept verbatim.
fn decode_segment(segment: &str) -> Cow<'_, str> {
    urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment))
}
