use std::any::Any;
use std::collections::HashMap;
use std::fmt;

type Slot = Box<dyn Any + Send + Sync>;

/// Side-channel state shared between middleware within one exchange.
///
/// Entries are keyed by name *and* type: the same name may hold one value of
/// each type without the two colliding.
#[derive(Default)]
pub struct Properties {
    entries: HashMap<String, Vec<Slot>>,
}

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, returning the previous value of the same type.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T) -> Option<T>
    where
        T: Any + Send + Sync,
    {
        let slots = self.entries.entry(key.into()).or_default();
        let previous = slots
            .iter()
            .position(|slot| slot.is::<T>())
            .map(|idx| slots.swap_remove(idx));
        slots.push(Box::new(value));
        previous.and_then(|slot| slot.downcast::<T>().ok()).map(|b| *b)
    }

    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries
            .get(key)?
            .iter()
            .find_map(|slot| slot.downcast_ref::<T>())
    }

    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        let slots = self.entries.get_mut(key)?;
        let idx = slots.iter().position(|slot| slot.is::<T>())?;
        let slot = slots.swap_remove(idx);
        if slots.is_empty() {
            self.entries.remove(key);
        }
        slot.downcast::<T>().ok().map(|b| *b)
    }

    #[must_use]
    pub fn contains<T: Any>(&self, key: &str) -> bool {
        self.get::<T>(key).is_some()
    }

    /// Number of stored values, across all names and types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
