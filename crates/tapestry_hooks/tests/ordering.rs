//! Tap ordering: `stage`, `before`, cycles and registration interceptors.


use tapestry_hooks::{Hook, HookError, Interceptor, TapOptions};
use test_utils::{EventLog, order_of, recording_tap, recording_taps};

#[test]
fn default_order_is_registration_order() {
    let hook: Hook<(u32,)> = Hook::sync();
    let log = EventLog::new();
    recording_taps(&hook, &["first", "second", "third"], &log);

    hook.call((0,)).unwrap();
    assert_eq!(log.events(), ["first", "second", "third"]);
    assert_eq!(order_of(&hook), ["first", "second", "third"]);
}

#[test]
fn stage_moves_taps_earlier_or_later() {
    let hook: Hook<(u32,)> = Hook::sync();
    let log = EventLog::new();
    recording_tap(&hook, TapOptions::new("late").stage(10), &log);
    recording_tap(&hook, "middle", &log);
    recording_tap(&hook, TapOptions::new("early").stage(-10), &log);

    hook.call((0,)).unwrap();
    assert_eq!(log.events(), ["early", "middle", "late"]);
}

#[test]
fn before_places_a_tap_ahead_of_named_taps() {
    let hook: Hook<(u32,)> = Hook::sync();
    let log = EventLog::new();
    recording_taps(&hook, &["resolve", "emit"], &log);
    recording_tap(&hook, TapOptions::new("banner").before("emit"), &log);

    hook.call((0,)).unwrap();
    assert_eq!(log.events(), ["resolve", "banner", "emit"]);
}

#[test]
fn cycle_fails_before_any_tap_runs() {
    let hook: Hook<(u32,)> = Hook::sync().named("seal");
    let log = EventLog::new();
    recording_tap(&hook, TapOptions::new("a").before("b"), &log);
    recording_tap(&hook, TapOptions::new("b").before("a"), &log);

    let err = hook.call((0,)).unwrap_err();
    assert!(
        matches!(err, HookError::OrderingCycle { ref hook, ref taps } if hook == "seal" && taps == &["a", "b"]),
        "{err}"
    );
    assert!(log.events().is_empty());
    assert!(hook.plan().is_err());
}

#[tokio::test]
async fn cycle_is_reported_through_every_entry_point() {
    let hook: Hook<(u32,)> = Hook::async_series();
    let log = EventLog::new();
    recording_tap(&hook, TapOptions::new("a").before("b"), &log);
    recording_tap(&hook, TapOptions::new("b").before("a"), &log);

    let err = hook.call_async((0,)).await.unwrap_err();
    assert!(matches!(err, HookError::OrderingCycle { .. }));

    let (tx, rx) = tokio::sync::oneshot::channel();
    hook.call_with((0,), move |outcome| {
        let _ = tx.send(outcome);
    });
    assert!(matches!(rx.await.unwrap(), Err(HookError::OrderingCycle { .. })));
    assert!(log.events().is_empty());
}

#[test]
fn removing_a_cycle_member_restores_the_hook() {
    let hook: Hook<(u32,)> = Hook::sync();
    let log = EventLog::new();
    recording_tap(&hook, TapOptions::new("a").before("b"), &log);
    let b = recording_tap(&hook, TapOptions::new("b").before("a"), &log);
    assert!(hook.call((0,)).is_err());

    assert!(b.unregister());
    hook.call((0,)).unwrap();
    assert_eq!(log.events(), ["a"]);
}

#[test]
fn register_interceptor_stage_orders_tap_last() {
    let hook: Hook<(u32,)> = Hook::sync();
    let log = EventLog::new();
    recording_taps(&hook, &["a", "b"], &log);

    hook.intercept(Interceptor::new("demote-late").on_register(|options| {
        if options.name == "late" {
            Ok(options.stage(100))
        } else {
            Ok(options)
        }
    }))
    .unwrap();
    recording_tap(&hook, "late", &log);
    recording_tap(&hook, "c", &log);

    assert_eq!(order_of(&hook), ["a", "b", "c", "late"]);
    let late = hook
        .materialized_order()
        .unwrap()
        .into_iter()
        .find(|tap| tap.name() == "late")
        .unwrap();
    assert_eq!(late.stage(), 100);
}

#[test]
fn attaching_register_interceptor_rewrites_existing_taps() {
    let hook: Hook<(u32,)> = Hook::sync();
    let log = EventLog::new();
    recording_taps(&hook, &["x", "y"], &log);

    hook.intercept(Interceptor::new("tagger").on_register(|options| {
        let stage = if options.name == "x" { 5 } else { 0 };
        Ok(options.stage(stage).meta("tagged", true))
    }))
    .unwrap();

    assert_eq!(order_of(&hook), ["y", "x"]);
    assert!(hook.taps().iter().all(|tap| tap.meta().get("tagged") == Some(&serde_json::Value::Bool(true))));
}

#[test]
fn failing_register_interceptor_rejects_the_tap() {
    let hook: Hook<(u32,)> = Hook::sync();
    hook.intercept(Interceptor::new("gate").on_register(|options| {
        if options.name.starts_with("unsafe") {
            return Err("blocked".into());
        }
        Ok(options)
    }))
    .unwrap();

    let err = hook.tap("unsafe-eval", |_| Ok(None)).unwrap_err();
    assert!(matches!(err, HookError::Interceptor { ref interceptor, .. } if interceptor == "gate"));
    assert_eq!(hook.tap_count(), 0);
    hook.tap("safe", |_| Ok(None)).unwrap();
    assert_eq!(hook.tap_count(), 1);
}

#[test]
fn empty_tap_name_is_invalid() {
    let hook: Hook<(u32,)> = Hook::sync();
    let err = hook.tap("", |_| Ok(None)).unwrap_err();
    assert!(matches!(err, HookError::InvalidTap { .. }));
}

// ─────────────────────────────────────────────────────────────────────────────
// Property-based ordering
// ─────────────────────────────────────────────────────────────────────────────

mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// One generated tap: its stage and the indices of earlier-registered taps
    /// it must run before.
    #[derive(Debug, Clone)]
    struct GenTap {
        stage: i32,
        before: Vec<usize>,
    }

    /// Taps whose `before` edges only point at earlier registrations, with
    /// the edge always going from the later tap to the earlier one. Such a
    /// graph has no cycles.
    fn tap_sets() -> impl Strategy<Value = Vec<GenTap>> {
        prop::collection::vec((-3i32..=3, prop::collection::vec(any::<prop::sample::Index>(), 0..3)), 1..12)
            .prop_map(|raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(position, (stage, targets))| GenTap {
                        stage,
                        before: if position == 0 {
                            Vec::new()
                        } else {
                            targets.iter().map(|index| index.index(position)).collect()
                        },
                    })
                    .collect()
            })
    }

    fn build(taps: &[GenTap]) -> Hook<(u32,)> {
        let hook: Hook<(u32,)> = Hook::sync();
        let log = EventLog::new();
        for (index, tap) in taps.iter().enumerate() {
            let mut options = TapOptions::new(format!("t{index}")).stage(tap.stage);
            for target in &tap.before {
                options = options.before(format!("t{target}"));
            }
            recording_tap(&hook, options, &log);
        }
        hook
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn without_before_order_is_stable_stage_sort(stages in prop::collection::vec(-5i32..=5, 0..16)) {
            let taps: Vec<GenTap> = stages.iter().map(|&stage| GenTap { stage, before: Vec::new() }).collect();
            let hook = build(&taps);

            let mut expected: Vec<(i32, usize)> = stages.iter().copied().zip(0..).collect();
            expected.sort_by_key(|&(stage, _)| stage);
            let expected: Vec<String> = expected.into_iter().map(|(_, index)| format!("t{index}")).collect();

            prop_assert_eq!(order_of(&hook), expected);
        }

        #[test]
        fn before_constraints_always_hold(taps in tap_sets()) {
            let hook = build(&taps);
            let order = order_of(&hook);
            prop_assert_eq!(order.len(), taps.len());

            let position = |name: String| order.iter().position(|n| *n == name).unwrap();
            for (index, tap) in taps.iter().enumerate() {
                for target in &tap.before {
                    let (tap_pos, target_pos) = (position(format!("t{index}")), position(format!("t{target}")));
                    prop_assert!(tap_pos < target_pos);
                }
            }
        }

        #[test]
        fn plan_rebuilds_are_idempotent(taps in tap_sets()) {
            let hook = build(&taps);
            let first = hook.plan().unwrap();
            let second = hook.plan().unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.tap_names, order_of(&hook));
        }
    }
}
