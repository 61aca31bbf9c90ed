//! Per-invocation context shared by taps and interceptors.
//!
//! A [`TapContext`] is created fresh for every invocation of a hook, and only
//! when some tap or interceptor asked for it. Everyone taking part in that
//! invocation sees the same context; nothing outlives the call.
//!
//! The context is a type-keyed map: each type stores at most one value.
//!
//! ```
//! use tapestry_hooks::TapContext;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Visited(Vec<&'static str>);
//!
//! let ctx = TapContext::new();
//! ctx.insert(Visited(vec!["resolve"]));
//! ctx.update(|visited: &mut Visited| visited.0.push("load"));
//!
//! assert_eq!(ctx.get::<Visited>(), Some(Visited(vec!["resolve", "load"])));
//! ```

use core::any::{Any, TypeId};
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;

type Slots = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

/// Shared, mutable, per-invocation context.
///
/// Cloning a context yields another handle to the same storage.
#[derive(Clone)]
pub struct TapContext {
    /// `None` for the detached context handed out when nobody asked for one.
    slots: Option<Arc<Mutex<Slots>>>,
}

impl TapContext {
    /// Creates a new, empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Some(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    /// Creates a context without storage. Inserts are dropped.
    pub(crate) fn detached() -> Self {
        Self { slots: None }
    }

    /// Returns `true` if this context has storage.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slots.is_some()
    }

    /// Stores a value, returning the previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<T> {
        let Some(slots) = &self.slots else {
            tracing::trace!(
                value_type = core::any::type_name::<T>(),
                "insert into detached tap context ignored"
            );
            return None;
        };
        slots
            .lock()
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|previous| previous.downcast::<T>().ok())
            .map(|previous| *previous)
    }

    /// Returns a clone of the stored value of type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync + Clone>(&self) -> Option<T> {
        let slots = self.slots.as_ref()?.lock();
        slots
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Returns `true` if a value of type `T` is stored.
    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.slots
            .as_ref()
            .is_some_and(|slots| slots.lock().contains_key(&TypeId::of::<T>()))
    }

    /// Applies `f` to the stored value of type `T`, if present.
    ///
    /// The lock is not held while `f` runs, so `f` may use the context.
    /// The value is taken out for the duration of `f`: nested reads of `T`
    /// see nothing, and a nested insert of `T` is overwritten when `f`
    /// returns.
    pub fn update<T, U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U>
    where
        T: Any + Send + Sync,
    {
        let slots = self.slots.as_ref()?;
        let mut value = slots
            .lock()
            .remove(&TypeId::of::<T>())?
            .downcast::<T>()
            .ok()?;
        let out = f(&mut value);
        slots.lock().insert(TypeId::of::<T>(), value);
        Some(out)
    }

    /// Applies `f` to the stored value of type `T`, inserting
    /// `T::default()` first if nothing is stored yet.
    ///
    /// Same locking behavior as [`update`](Self::update).
    pub fn update_or_default<T, U>(&self, f: impl FnOnce(&mut T) -> U) -> Option<U>
    where
        T: Any + Send + Sync + Default,
    {
        let slots = self.slots.as_ref()?;
        let stored = slots.lock().remove(&TypeId::of::<T>());
        let mut value = stored
            .and_then(|value| value.downcast::<T>().ok())
            .unwrap_or_default();
        let out = f(&mut value);
        slots.lock().insert(TypeId::of::<T>(), value);
        Some(out)
    }

    /// Removes and returns the stored value of type `T`.
    pub fn remove<T: Any + Send + Sync>(&self) -> Option<T> {
        let mut slots = self.slots.as_ref()?.lock();
        slots
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.as_ref().map_or(0, |slots| slots.lock().len())
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TapContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TapContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapContext")
            .field("attached", &self.is_attached())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Counter(u32);

    #[test]
    fn insert_and_get() {
        let ctx = TapContext::new();
        assert_eq!(ctx.insert(Counter(1)), None);
        assert_eq!(ctx.insert(Counter(2)), Some(Counter(1)));
        assert_eq!(ctx.get::<Counter>(), Some(Counter(2)));
        assert!(ctx.contains::<Counter>());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn clones_share_storage() {
        let ctx = TapContext::new();
        let other = ctx.clone();
        other.insert(Counter(5));
        assert_eq!(ctx.get::<Counter>(), Some(Counter(5)));
    }

    #[test]
    fn update_or_default_inserts_first() {
        let ctx = TapContext::new();
        ctx.update_or_default(|c: &mut Counter| c.0 += 1);
        ctx.update_or_default(|c: &mut Counter| c.0 += 1);
        assert_eq!(ctx.remove::<Counter>(), Some(Counter(2)));
        assert!(ctx.is_empty());
    }

    #[test]
    fn default_context_is_attached() {
        let ctx = TapContext::default();
        assert!(ctx.is_attached());
        ctx.insert(Counter(3));
        assert_eq!(ctx.get::<Counter>(), Some(Counter(3)));
    }

    #[test]
    fn update_closure_may_use_the_context() {
        #[derive(Debug, Clone, PartialEq)]
        struct Seen(bool);

        let ctx = TapContext::new();
        let other = ctx.clone();
        ctx.insert(Counter(1));

        let nested = ctx.update(|c: &mut Counter| {
            c.0 += 1;
            other.insert(Seen(other.contains::<Counter>()));
            other.len()
        });
        assert_eq!(nested, Some(1));
        assert_eq!(ctx.get::<Counter>(), Some(Counter(2)));
        assert_eq!(ctx.get::<Seen>(), Some(Seen(false)));

        let total = ctx.update_or_default(|c: &mut Counter| {
            c.0 += 1;
            other.get::<Counter>()
        });
        assert_eq!(total, Some(None));
        assert_eq!(ctx.get::<Counter>(), Some(Counter(3)));
    }

    #[test]
    fn update_of_a_missing_value_changes_nothing() {
        let ctx = TapContext::new();
        assert_eq!(ctx.update(|c: &mut Counter| c.0), None);
        assert!(ctx.is_empty());
    }

    #[test]
    fn detached_context_drops_writes() {
        let ctx = TapContext::detached();
        assert!(!ctx.is_attached());
        assert_eq!(ctx.insert(Counter(1)), None);
        assert_eq!(ctx.get::<Counter>(), None);
        assert_eq!(ctx.update(|c: &mut Counter| c.0), None);
        assert!(ctx.is_empty());
    }
}
