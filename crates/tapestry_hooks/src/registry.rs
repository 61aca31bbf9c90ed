//! Tap storage and call-order resolution for one hook.
//!
//! # Ordering
//!
//! Taps are ordered by three rules, strongest first:
//!
//! 1. A tap listing `name` in its `before` set runs before every tap called
//!    `name`. Unknown names are ignored and a tap never constrains itself.
//! 2. Lower `stage` runs earlier.
//! 3. Ties keep registration order.
//!
//! This is Kahn's algorithm with the ready set kept in a min-heap keyed by
//! `(stage, registration index)`. Without `before` constraints it reduces to
//! a stable sort by stage. Constraints that cannot all hold are reported as
//! [`HookError::OrderingCycle`].

use core::cmp::Reverse;
use std::collections::BinaryHeap;

use hashbrown::HashMap;

use crate::error::HookError;
use crate::tap::{TapCallback, TapId, TapInfo, TapKind, TapOptions};

/// A stored tap: its description plus the callback.
pub(crate) struct TapEntry<A, R> {
    pub(crate) info: TapInfo,
    pub(crate) callback: TapCallback<A, R>,
}

/// Ordered tap storage for exactly one hook.
pub(crate) struct TapRegistry<A, R> {
    /// Taps in registration order.
    entries: Vec<TapEntry<A, R>>,
    next_id: u64,
    /// Cached call order, as indices into `entries`.
    order: Option<Vec<usize>>,
}

impl<A, R> Default for TapRegistry<A, R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
            order: None,
        }
    }
}

impl<A, R> TapRegistry<A, R> {
    /// Validates and appends a tap whose options already went through the
    /// `register` interceptors.
    pub(crate) fn insert(
        &mut self,
        hook: &str,
        kind: TapKind,
        context: bool,
        options: TapOptions,
        callback: TapCallback<A, R>,
    ) -> Result<TapInfo, HookError> {
        validate(hook, &options)?;

        let info = TapInfo {
            id: TapId(self.next_id),
            kind,
            context,
            options,
        };
        self.next_id += 1;
        self.entries.push(TapEntry {
            info: info.clone(),
            callback,
        });
        self.order = None;
        Ok(info)
    }

    /// Replaces the options of a stored tap. Returns `false` if the tap is gone.
    pub(crate) fn rewrite(
        &mut self,
        hook: &str,
        id: TapId,
        options: TapOptions,
    ) -> Result<bool, HookError> {
        validate(hook, &options)?;
        let Some(entry) = self.entries.iter_mut().find(|entry| entry.info.id == id) else {
            return Ok(false);
        };
        entry.info.options = options;
        self.order = None;
        Ok(true)
    }

    /// Removes one tap. Returns `false` if no tap has this id.
    pub(crate) fn remove(&mut self, id: TapId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.info.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.order = None;
        }
        removed
    }

    /// Removes every tap.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order = None;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Taps in registration order.
    pub(crate) fn entries(&self) -> &[TapEntry<A, R>] {
        &self.entries
    }

    /// Returns the call order as indices into [`entries`](Self::entries),
    /// computing and caching it if needed.
    pub(crate) fn order(&mut self, hook: &str) -> Result<Vec<usize>, HookError> {
        if let Some(order) = &self.order {
            return Ok(order.clone());
        }
        let order = resolve_order(hook, &self.entries)?;
        self.order = Some(order.clone());
        Ok(order)
    }

    /// Returns the taps in call order.
    pub(crate) fn materialized_order(&mut self, hook: &str) -> Result<Vec<TapInfo>, HookError> {
        let order = self.order(hook)?;
        Ok(order
            .into_iter()
            .map(|index| self.entries[index].info.clone())
            .collect())
    }
}

pub(crate) fn validate(hook: &str, options: &TapOptions) -> Result<(), HookError> {
    if options.name.trim().is_empty() {
        return Err(HookError::InvalidTap {
            hook: hook.to_owned(),
            reason: "tap name must not be empty".to_owned(),
        });
    }
    Ok(())
}

fn resolve_order<A, R>(hook: &str, entries: &[TapEntry<A, R>]) -> Result<Vec<usize>, HookError> {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        by_name.entry(entry.info.name()).or_default().push(index);
    }

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
    let mut pending = vec![0usize; entries.len()];
    for (index, entry) in entries.iter().enumerate() {
        for target in entry.info.before() {
            let Some(targets) = by_name.get(target.as_str()) else {
                continue;
            };
            for &later in targets {
                if later != index {
                    successors[index].push(later);
                    pending[later] += 1;
                }
            }
        }
    }

    let key = |index: usize| Reverse((entries[index].info.stage(), index));
    let mut ready: BinaryHeap<_> = (0..entries.len())
        .filter(|&index| pending[index] == 0)
        .map(key)
        .collect();

    let mut order = Vec::with_capacity(entries.len());
    while let Some(Reverse((_, index))) = ready.pop() {
        order.push(index);
        for &later in &successors[index] {
            pending[later] -= 1;
            if pending[later] == 0 {
                ready.push(key(later));
            }
        }
    }

    if order.len() < entries.len() {
        let taps = (0..entries.len())
            .filter(|&index| pending[index] > 0)
            .map(|index| entries[index].info.name().to_owned())
            .collect();
        return Err(HookError::OrderingCycle {
            hook: hook.to_owned(),
            taps,
        });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn registry(taps: &[TapOptions]) -> TapRegistry<(), ()> {
        let mut registry = TapRegistry::default();
        for options in taps {
            registry
                .insert(
                    "test",
                    TapKind::Sync,
                    false,
                    options.clone(),
                    TapCallback::Sync(Arc::new(|_, _| Ok(None))),
                )
                .expect("valid tap");
        }
        registry
    }

    fn names(registry: &mut TapRegistry<(), ()>) -> Vec<String> {
        registry
            .materialized_order("test")
            .expect("orderable")
            .iter()
            .map(|tap| tap.name().to_owned())
            .collect()
    }

    #[test]
    fn registration_order_by_default() {
        let mut registry = registry(&["a".into(), "b".into(), "c".into()]);
        assert_eq!(names(&mut registry), ["a", "b", "c"]);
    }

    #[test]
    fn stage_sorts_stably() {
        let mut registry = registry(&[
            TapOptions::new("late").stage(5),
            TapOptions::new("first"),
            TapOptions::new("early").stage(-5),
            TapOptions::new("second"),
        ]);
        assert_eq!(names(&mut registry), ["early", "first", "second", "late"]);
    }

    #[test]
    fn before_overrides_stage() {
        let mut registry = registry(&[
            TapOptions::new("emit"),
            TapOptions::new("banner").stage(10).before("emit"),
        ]);
        assert_eq!(names(&mut registry), ["banner", "emit"]);
    }

    #[test]
    fn before_applies_to_every_tap_with_that_name() {
        let mut registry = registry(&[
            TapOptions::new("log"),
            TapOptions::new("other"),
            TapOptions::new("log"),
            TapOptions::new("guard").before("log"),
        ]);
        assert_eq!(names(&mut registry), ["other", "guard", "log", "log"]);
    }

    #[test]
    fn unknown_and_self_references_are_ignored() {
        let mut registry = registry(&[
            TapOptions::new("a").before("missing"),
            TapOptions::new("b").before("b"),
        ]);
        assert_eq!(names(&mut registry), ["a", "b"]);
    }

    #[test]
    fn cycle_is_reported_with_its_members() {
        let mut registry = registry(&[
            TapOptions::new("a").before("b"),
            TapOptions::new("b").before("a"),
            TapOptions::new("free"),
        ]);
        let err = registry.materialized_order("test").unwrap_err();
        match err {
            HookError::OrderingCycle { hook, taps } => {
                assert_eq!(hook, "test");
                assert_eq!(taps, ["a", "b"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut registry = TapRegistry::<(), ()>::default();
        let err = registry
            .insert(
                "test",
                TapKind::Sync,
                false,
                TapOptions::new("  "),
                TapCallback::Sync(Arc::new(|_, _| Ok(None))),
            )
            .unwrap_err();
        assert!(matches!(err, HookError::InvalidTap { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_and_rewrite_invalidate_cached_order() {
        let mut registry = registry(&["a".into(), "b".into(), "c".into()]);
        assert_eq!(names(&mut registry), ["a", "b", "c"]);

        let b = registry.entries()[1].info.id();
        assert!(registry.remove(b));
        assert!(!registry.remove(b));
        assert_eq!(names(&mut registry), ["a", "c"]);

        let a = registry.entries()[0].info.id();
        assert!(registry.rewrite("test", a, TapOptions::new("a").stage(1)).unwrap());
        assert_eq!(names(&mut registry), ["c", "a"]);

        registry.clear();
        assert_eq!(registry.len(), 0);
        assert!(names(&mut registry).is_empty());
    }
}
