//! Keyed collections of hooks, created on first use.
//!
//! A [`HookMap`] is useful when an extension point is parameterized, for
//! example one hook per file extension:
//!
//! ```
//! use tapestry_hooks::{Hook, HookMap};
//!
//! let loaders: HookMap<String, (String,), String> =
//!     HookMap::new(|ext: &String| Hook::sync_bail().named(format!("load.{ext}")));
//!
//! loaders
//!     .for_key(&"json".to_string())
//!     .tap("JsonLoader", |(source,)| Ok(Some(format!("json:{source}"))))?;
//!
//! let hook = loaders.get(&"json".to_string()).expect("created above");
//! assert_eq!(hook.call(("{}".into(),))?, Some("json:{}".into()));
//! assert!(loaders.get(&"css".to_string()).is_none());
//! # Ok::<(), tapestry_hooks::HookError>(())
//! ```

use core::fmt;
use core::hash::Hash;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::args::{HookArgs, HookOutput};
use crate::hook::Hook;

type Factory<K, A, R> = Arc<dyn Fn(&K) -> Hook<A, R> + Send + Sync>;
type Decorator<K, A, R> = Arc<dyn Fn(&K, Hook<A, R>) -> Hook<A, R> + Send + Sync>;

/// Observer attached to a [`HookMap`].
///
/// Its `factory` callback sees every hook the map constructs and may replace
/// it, typically to attach interceptors or set a name.
pub struct HookMapInterceptor<K, A, R = ()> {
    name: Arc<str>,
    factory: Option<Decorator<K, A, R>>,
}

impl<K, A, R> HookMapInterceptor<K, A, R> {
    /// Creates an interceptor with no callbacks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            factory: None,
        }
    }

    /// Returns the interceptor's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the `factory` callback.
    #[must_use]
    pub fn on_factory<F>(mut self, f: F) -> Self
    where
        F: Fn(&K, Hook<A, R>) -> Hook<A, R> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(f));
        self
    }
}

impl<K, A, R> Clone for HookMapInterceptor<K, A, R> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            factory: self.factory.clone(),
        }
    }
}

impl<K, A, R> fmt::Debug for HookMapInterceptor<K, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookMapInterceptor")
            .field("name", &self.name)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// Hooks in creation order, indexed by key.
struct Slots<K, A, R> {
    index: HashMap<K, usize>,
    hooks: Vec<(K, Hook<A, R>)>,
}

/// A keyed collection of hooks of one variant.
pub struct HookMap<K, A, R = ()> {
    factory: Factory<K, A, R>,
    slots: RwLock<Slots<K, A, R>>,
    interceptors: RwLock<Vec<HookMapInterceptor<K, A, R>>>,
}

impl<K, A, R> HookMap<K, A, R>
where
    K: Eq + Hash + Clone,
    A: HookArgs,
    R: HookOutput,
{
    /// Creates an empty map that builds hooks with `factory`.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&K) -> Hook<A, R> + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            slots: RwLock::new(Slots {
                index: HashMap::new(),
                hooks: Vec::new(),
            }),
            interceptors: RwLock::new(Vec::new()),
        }
    }

    /// Returns the hook for `key`, creating it on first use.
    pub fn for_key(&self, key: &K) -> Hook<A, R> {
        if let Some(hook) = self.get(key) {
            return hook;
        }

        let interceptors = self.interceptors.read().clone();
        let mut hook = (self.factory)(key);
        for interceptor in &interceptors {
            if let Some(factory) = &interceptor.factory {
                hook = factory(key, hook);
            }
        }

        let mut slots = self.slots.write();
        // another caller may have won the race
        if let Some(&index) = slots.index.get(key) {
            return slots.hooks[index].1.clone();
        }
        let index = slots.hooks.len();
        slots.index.insert(key.clone(), index);
        slots.hooks.push((key.clone(), hook.clone()));
        tracing::debug!(hooks = index + 1, kind = %hook.kind(), "hook map entry created");
        hook
    }

    /// Returns the hook for `key` without creating it.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Hook<A, R>> {
        let slots = self.slots.read();
        slots
            .index
            .get(key)
            .map(|&index| slots.hooks[index].1.clone())
    }

    /// Calls `f` for every hook created so far, in creation order.
    ///
    /// Never creates hooks. `f` runs without the map locked, so it may call
    /// back into the map.
    pub fn for_each_existing(&self, mut f: impl FnMut(&K, &Hook<A, R>)) {
        let snapshot = self.slots.read().hooks.clone();
        for (key, hook) in &snapshot {
            f(key, hook);
        }
    }

    /// Returns the keys of every hook created so far, in creation order.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.slots
            .read()
            .hooks
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Returns the number of hooks created so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().hooks.len()
    }

    /// Returns `true` if no hook was created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attaches an interceptor. Applies to hooks created from now on.
    pub fn intercept(&self, interceptor: HookMapInterceptor<K, A, R>) {
        tracing::debug!(interceptor = interceptor.name(), "hook map interceptor attached");
        self.interceptors.write().push(interceptor);
    }
}

impl<K, A, R> fmt::Debug for HookMap<K, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookMap")
            .field("hooks", &self.slots.read().hooks.len())
            .field("interceptors", &self.interceptors.read().len())
            .finish_non_exhaustive()
    }
}
