//! Interceptor lifecycle across sync and async dispatch.


use std::sync::Arc;

use tapestry_hooks::{Hook, HookError, InterceptStage, Interceptor, TapContext};
use test_utils::{EventLog, failure, recording_taps};

/// An interceptor that logs every lifecycle callback into `log`.
fn tracer<R: std::fmt::Debug + Send + Sync + 'static>(name: &'static str, log: &EventLog) -> Interceptor<(u32,), R> {
    let (call, tap, result, error, done) = (log.clone(), log.clone(), log.clone(), log.clone(), log.clone());
    Interceptor::<(u32,), R>::new(name)
        .on_call(move |_, (x,)| {
            call.push(format!("{name}:call({x})"));
            Ok(())
        })
        .on_tap(move |_, info| {
            tap.push(format!("{name}:tap({})", info.name()));
            Ok(())
        })
        .on_result(move |_, value| {
            result.push(format!("{name}:result({value:?})"));
            Ok(())
        })
        .on_error(move |_, err| error.push(format!("{name}:error({})", err.tap_name().unwrap_or("-"))))
        .on_done(move |_| {
            done.push(format!("{name}:done"));
            Ok(())
        })
}

#[test]
fn lifecycle_order_on_success() {
    let hook: Hook<(u32,), u32> = Hook::sync_bail();
    let log = EventLog::new();
    hook.intercept(tracer("i1", &log)).unwrap();
    hook.intercept(tracer("i2", &log)).unwrap();

    let l = log.clone();
    hook.tap("skip", move |_| {
        l.push("skip");
        Ok(None)
    })
    .unwrap();
    hook.tap("answer", |(x,)| Ok(Some(x * 2))).unwrap();

    assert_eq!(hook.call((5,)).unwrap(), Some(10));
    assert_eq!(
        log.events(),
        [
            "i1:call(5)",
            "i2:call(5)",
            "i1:tap(skip)",
            "i2:tap(skip)",
            "skip",
            "i1:tap(answer)",
            "i2:tap(answer)",
            "i1:result(10)",
            "i2:result(10)",
            "i1:done",
            "i2:done",
        ]
    );
}

#[test]
fn no_result_means_no_result_callback() {
    let hook: Hook<(u32,), u32> = Hook::sync();
    let log = EventLog::new();
    hook.intercept(tracer("i", &log)).unwrap();
    hook.tap("t", |_| Ok(Some(1))).unwrap();

    hook.call((1,)).unwrap();
    assert_eq!(log.events(), ["i:call(1)", "i:tap(t)", "i:done"]);
}

#[tokio::test]
async fn tap_failure_fires_error_then_propagates() {
    let hook: Hook<(u32,), u32> = Hook::async_series();
    let log = EventLog::new();
    hook.intercept(tracer("i", &log)).unwrap();
    hook.tap_promise("reject", |_| async { Err(failure("bad")) }).unwrap();

    let err = hook.call_async((2,)).await.unwrap_err();
    assert!(matches!(err, HookError::Tap { .. }));
    assert_eq!(log.events(), ["i:call(2)", "i:tap(reject)", "i:error(reject)"]);
}

#[test]
fn failing_call_interceptor_aborts_without_error_callbacks() {
    let hook: Hook<(u32,)> = Hook::sync();
    let log = EventLog::new();
    hook.intercept(tracer("observer", &log)).unwrap();
    hook.intercept(Interceptor::<(u32,)>::new("guard").on_call(|_, (x,)| {
        if *x > 10 {
            return Err("too large".into());
        }
        Ok(())
    }))
    .unwrap();
    recording_taps(&hook, &["tap"], &log);

    let err = hook.call((11,)).unwrap_err();
    assert!(matches!(
        err,
        HookError::Interceptor { ref interceptor, stage: InterceptStage::Call, .. } if interceptor == "guard"
    ));
    assert_eq!(log.events(), ["observer:call(11)"]);

    log.clear();
    hook.call((1,)).unwrap();
    assert_eq!(
        log.events(),
        ["observer:call(1)", "observer:tap(tap)", "tap", "observer:done"]
    );
}

#[test]
fn failing_tap_interceptor_skips_the_tap() {
    let hook: Hook<(u32,)> = Hook::sync();
    let log = EventLog::new();
    hook.intercept(Interceptor::new("deny").on_tap(|_, info| {
        if info.name() == "blocked" {
            return Err("denied".into());
        }
        Ok(())
    }))
    .unwrap();
    recording_taps(&hook, &["allowed", "blocked", "unreached"], &log);

    let err = hook.call((0,)).unwrap_err();
    assert!(matches!(err, HookError::Interceptor { stage: InterceptStage::Tap, .. }));
    assert_eq!(log.events(), ["allowed"]);
}

#[test]
fn context_flows_from_interceptors_to_taps() {
    #[derive(Clone, Debug, PartialEq)]
    struct RequestId(u32);

    let hook: Hook<(u32,), u32> = Hook::sync_bail();
    hook.intercept(
        Interceptor::<(u32,), u32>::new("stamp")
            .with_context()
            .on_call(|ctx, (x,)| {
                ctx.insert(RequestId(*x));
                Ok(())
            }),
    )
    .unwrap();
    hook.tap_with_context("read", |ctx: &TapContext, _| {
        Ok(ctx.get::<RequestId>().map(|id| id.0 + 1))
    })
    .unwrap();

    assert!(hook.plan().unwrap().needs_context);
    assert_eq!(hook.call((41,)).unwrap(), Some(42));
}

#[test]
fn taps_without_context_see_a_detached_context() {
    let hook: Hook<(u32,), bool> = Hook::sync_bail();
    let seen = Arc::new(parking_lot::Mutex::new(None));
    let slot = Arc::clone(&seen);
    hook.intercept(Interceptor::new("probe").on_call(move |ctx, _| {
        *slot.lock() = Some(ctx.is_attached());
        Ok(())
    }))
    .unwrap();
    hook.tap("t", |_| Ok(None)).unwrap();

    let plan = hook.plan().unwrap();
    assert!(!plan.needs_context);
    assert!(plan.intercepted);
    hook.call((0,)).unwrap();
    assert_eq!(*seen.lock(), Some(false));
}

#[test]
fn plan_summary_tracks_interceptors_and_version() {
    let hook: Hook<(u32,)> = Hook::sync();
    let bare = hook.plan().unwrap();
    assert!(!bare.intercepted);
    assert!(bare.all_sync);
    assert!(bare.taps.is_empty());

    hook.intercept(Interceptor::new("register-only").on_register(Ok))
        .unwrap();
    let registered = hook.plan().unwrap();
    assert!(registered.version > bare.version);
    // register callbacks never run during invocation
    assert!(!registered.intercepted);

    hook.intercept(Interceptor::new("done").on_done(|_| Ok(())))
        .unwrap();
    assert!(hook.plan().unwrap().intercepted);
    assert!(hook.is_used());
}

#[tokio::test]
async fn done_fires_after_parallel_taps_settle() {
    let hook: Hook<(u32,)> = Hook::async_parallel();
    let log = EventLog::new();
    hook.intercept(tracer("i", &log)).unwrap();
    for (name, ms) in [("a", 10), ("b", 1)] {
        let l = log.clone();
        hook.tap_promise(name, move |_| {
            let l = l.clone();
            async move {
                test_utils::delay(ms).await;
                l.push(name);
                Ok(None)
            }
        })
        .unwrap();
    }

    hook.call_async((3,)).await.unwrap();
    assert_eq!(
        log.events(),
        ["i:call(3)", "i:tap(a)", "i:tap(b)", "b", "a", "i:done"]
    );
}
