use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of route values before heap allocation.
/// Most routes carry ≤4 parameters (e.g. `/users/{id}/posts/{post_id}`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Names are `Arc<str>` because they come from the compiled pattern (known at
/// startup); values are per-request `String`s.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Values extracted by a successful route match.
///
/// Lookups are case-insensitive on the name; values keep the case they had in
/// the request path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteData {
    values: ParamVec,
}

impl RouteData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value. Replacement matches names case-insensitively.
    pub fn insert(&mut self, name: Arc<str>, value: String) {
        if let Some(slot) = self
            .values
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            slot.1 = value;
        } else {
            self.values.push((name, value));
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }
}

impl FromIterator<(Arc<str>, String)> for RouteData {
    fn from_iter<I: IntoIterator<Item = (Arc<str>, String)>>(iter: I) -> Self {
        let mut data = RouteData::new();
        for (k, v) in iter {
            data.insert(k, v);
        }
        data
    }
}
