//! Per-tap wall-clock profiling through interceptors.
//!
//! A [`ProfilingInterceptor`] keeps a small per-invocation record in the
//! [`TapContext`]. A tap's time runs from its `tap` callback to the next
//! tap's `tap` callback, or to `done`/`error` for the last tap that ran.
//! That is exact for hooks whose taps run one after another. Parallel kinds
//! start every tap before any settles, so only the invocation total is
//! recorded for them.
//!
//! Measurements accumulate in a shared [`TapTimings`] that any number of
//! hooks can report into.
//!
//! # Example
//!
//! ```
//! use tapestry_core_plugins::{ProfilingInterceptor, TapTimings};
//! use tapestry_hooks::Hook;
//!
//! let timings = TapTimings::new();
//! let compile: Hook<(u32,)> = Hook::sync().named("compile");
//! ProfilingInterceptor::new(&timings).attach(&compile)?;
//! compile.tap("Parse", |_| Ok(None))?;
//!
//! compile.call((1,))?;
//! assert_eq!(timings.tap("compile", "Parse").map(|t| t.calls), Some(1));
//! assert_eq!(timings.hook("compile").map(|h| h.invocations), Some(1));
//! # Ok::<(), tapestry_hooks::HookError>(())
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use tapestry_hooks::{Hook, HookArgs, HookError, HookKind, HookOutput, Interceptor, TapContext};

use crate::Clock;

fn micros<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}

// ─────────────────────────────────────────────────────────────────────────────
// Report types
// ─────────────────────────────────────────────────────────────────────────────

/// Accumulated time spent in one tap of one hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TapTiming {
    /// Label of the hook the tap belongs to.
    pub hook: String,
    /// Tap name. Taps sharing a name on the same hook share an entry.
    pub tap: String,
    /// Number of times the tap ran.
    pub calls: u64,
    /// Sum of all runs.
    #[serde(rename = "total_us", serialize_with = "micros")]
    pub total: Duration,
    /// Longest single run.
    #[serde(rename = "max_us", serialize_with = "micros")]
    pub max: Duration,
}

/// Accumulated invocation time of one hook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HookTiming {
    /// Hook label.
    pub hook: String,
    /// Completed invocations, successful or not.
    pub invocations: u64,
    /// Invocations that ended in the error lane.
    pub failures: u64,
    /// Sum of all invocations, from `call` to `done` or `error`.
    #[serde(rename = "total_us", serialize_with = "micros")]
    pub total: Duration,
}

/// Snapshot of everything a [`TapTimings`] has collected, in first-seen
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileReport {
    /// One entry per hook label.
    pub hooks: Vec<HookTiming>,
    /// One entry per (hook label, tap name).
    pub taps: Vec<TapTiming>,
}

// ─────────────────────────────────────────────────────────────────────────────
// TapTimings
// ─────────────────────────────────────────────────────────────────────────────

/// Shared, thread-safe sink for profiling measurements.
///
/// Clones report into the same storage.
#[derive(Debug, Clone, Default)]
pub struct TapTimings {
    report: Arc<Mutex<ProfileReport>>,
}

impl TapTimings {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record_tap(&self, hook: &str, tap: &str, elapsed: Duration) {
        let mut report = self.report.lock();
        let index = match report.taps.iter().position(|t| t.hook == hook && t.tap == tap) {
            Some(index) => index,
            None => {
                report.taps.push(TapTiming {
                    hook: hook.to_owned(),
                    tap: tap.to_owned(),
                    ..TapTiming::default()
                });
                report.taps.len() - 1
            }
        };
        let entry = &mut report.taps[index];
        entry.calls += 1;
        entry.total += elapsed;
        entry.max = entry.max.max(elapsed);
    }

    fn record_invocation(&self, hook: &str, elapsed: Duration, failed: bool) {
        let mut report = self.report.lock();
        let index = match report.hooks.iter().position(|h| h.hook == hook) {
            Some(index) => index,
            None => {
                report.hooks.push(HookTiming {
                    hook: hook.to_owned(),
                    ..HookTiming::default()
                });
                report.hooks.len() - 1
            }
        };
        let entry = &mut report.hooks[index];
        entry.invocations += 1;
        entry.failures += u64::from(failed);
        entry.total += elapsed;
    }

    /// Returns the accumulated timing of `tap` on `hook`.
    #[must_use]
    pub fn tap(&self, hook: &str, tap: &str) -> Option<TapTiming> {
        self.report
            .lock()
            .taps
            .iter()
            .find(|t| t.hook == hook && t.tap == tap)
            .cloned()
    }

    /// Returns the accumulated invocation timing of `hook`.
    #[must_use]
    pub fn hook(&self, hook: &str) -> Option<HookTiming> {
        self.report.lock().hooks.iter().find(|h| h.hook == hook).cloned()
    }

    /// Returns a copy of everything collected so far.
    #[must_use]
    pub fn report(&self) -> ProfileReport {
        self.report.lock().clone()
    }

    /// Returns the taps sorted by total time, slowest first.
    #[must_use]
    pub fn slowest_taps(&self, limit: usize) -> Vec<TapTiming> {
        let mut taps = self.report.lock().taps.clone();
        taps.sort_by(|a, b| b.total.cmp(&a.total));
        taps.truncate(limit);
        taps
    }

    /// Serializes the current report as pretty-printed JSON. Durations are
    /// written in whole microseconds.
    ///
    /// # Errors
    ///
    /// Returns the serializer's error, which cannot happen for these types
    /// in practice.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.report())
    }

    /// Discards every measurement.
    pub fn reset(&self) {
        *self.report.lock() = ProfileReport::default();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ProfilingInterceptor
// ─────────────────────────────────────────────────────────────────────────────

/// Per-invocation state kept in the [`TapContext`].
struct Invocation {
    started: Instant,
    running: Option<(String, Instant)>,
}

/// Builder for a timing [`Interceptor`].
#[derive(Debug, Clone)]
pub struct ProfilingInterceptor {
    timings: TapTimings,
    clock: Clock,
}

impl ProfilingInterceptor {
    /// Reports into `timings`, measuring with the system clock.
    #[must_use]
    pub fn new(timings: &TapTimings) -> Self {
        Self {
            timings: timings.clone(),
            clock: Clock::system(),
        }
    }

    /// Measures with a custom clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Attaches a profiling interceptor to `hook`, labelled with the hook's
    /// name.
    ///
    /// # Errors
    ///
    /// Mirrors [`Hook::intercept`]; the profiler has no register callback so
    /// this does not fail in practice.
    pub fn attach<A: HookArgs, R: HookOutput>(&self, hook: &Hook<A, R>) -> Result<(), HookError> {
        let label = hook.label();
        hook.intercept(self.interceptor(label, hook.kind()))
    }

    /// Builds the interceptor for a hook of `kind` labelled `hook` in the
    /// report.
    #[must_use]
    pub fn interceptor<A: 'static, R: 'static>(
        &self,
        hook: impl Into<String>,
        kind: HookKind,
    ) -> Interceptor<A, R> {
        let hook: Arc<str> = Arc::from(hook.into());

        let mut interceptor = Interceptor::new("profiling")
            .with_context()
            .on_call({
                let clock = self.clock.clone();
                move |ctx, _: &A| {
                    ctx.insert(Invocation {
                        started: clock.now(),
                        running: None,
                    });
                    Ok(())
                }
            })
            .on_done({
                let (hook, clock, timings) = (Arc::clone(&hook), self.clock.clone(), self.timings.clone());
                move |ctx| {
                    finish(ctx, &hook, &clock, &timings, false);
                    Ok(())
                }
            })
            .on_error({
                let (hook, clock, timings) = (Arc::clone(&hook), self.clock.clone(), self.timings.clone());
                move |ctx, _| finish(ctx, &hook, &clock, &timings, true)
            });

        if !matches!(kind, HookKind::AsyncParallel | HookKind::AsyncParallelBail) {
            let (clock, timings) = (self.clock.clone(), self.timings.clone());
            interceptor = interceptor.on_tap(move |ctx, info| {
                let now = clock.now();
                let previous = ctx
                    .update(|invocation: &mut Invocation| {
                        invocation.running.replace((info.name().to_owned(), now))
                    })
                    .flatten();
                if let Some((tap, started)) = previous {
                    timings.record_tap(&hook, &tap, now.saturating_duration_since(started));
                }
                Ok(())
            });
        }

        interceptor
    }
}

fn finish(ctx: &TapContext, hook: &str, clock: &Clock, timings: &TapTimings, failed: bool) {
    let Some(invocation) = ctx.remove::<Invocation>() else {
        return;
    };
    let now = clock.now();
    if let Some((tap, started)) = invocation.running {
        timings.record_tap(hook, &tap, now.saturating_duration_since(started));
    }
    timings.record_invocation(hook, now.saturating_duration_since(invocation.started), failed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockClock;

    fn mock() -> (Arc<MockClock>, Clock) {
        let mock = Arc::new(MockClock::new(Instant::now()));
        let clock = Clock::with_provider(mock.clone());
        (mock, clock)
    }

    fn ticking_tap(hook: &Hook<(u32,)>, name: &str, mock: &Arc<MockClock>, ms: u64) {
        let mock = Arc::clone(mock);
        hook.tap(name, move |_| {
            mock.advance(Duration::from_millis(ms));
            Ok(None)
        })
        .unwrap();
    }

    #[test]
    fn series_taps_are_timed_individually() {
        let (mock, clock) = mock();
        let timings = TapTimings::new();
        let hook: Hook<(u32,)> = Hook::sync().named("make");
        ProfilingInterceptor::new(&timings).with_clock(clock).attach(&hook).unwrap();
        ticking_tap(&hook, "a", &mock, 5);
        ticking_tap(&hook, "b", &mock, 10);

        hook.call((0,)).unwrap();
        hook.call((0,)).unwrap();

        let a = timings.tap("make", "a").unwrap();
        assert_eq!((a.calls, a.total, a.max), (2, Duration::from_millis(10), Duration::from_millis(5)));
        let b = timings.tap("make", "b").unwrap();
        assert_eq!(b.total, Duration::from_millis(20));

        let make = timings.hook("make").unwrap();
        assert_eq!(make.invocations, 2);
        assert_eq!(make.failures, 0);
        assert_eq!(make.total, Duration::from_millis(30));
        assert_eq!(
            timings.slowest_taps(1).first().map(|t| t.tap.as_str()),
            Some("b")
        );
    }

    #[test]
    fn failures_close_the_running_tap() {
        let (mock, clock) = mock();
        let timings = TapTimings::new();
        let hook: Hook<(u32,)> = Hook::sync().named("seal");
        ProfilingInterceptor::new(&timings).with_clock(clock).attach(&hook).unwrap();
        let m = Arc::clone(&mock);
        hook.tap("broken", move |_| {
            m.advance(Duration::from_millis(3));
            Err("nope".into())
        })
        .unwrap();

        assert!(hook.call((0,)).is_err());
        assert_eq!(timings.tap("seal", "broken").unwrap().total, Duration::from_millis(3));
        let seal = timings.hook("seal").unwrap();
        assert_eq!((seal.invocations, seal.failures), (1, 1));
    }

    #[test]
    fn unnamed_hooks_report_under_the_hook_label() {
        let (mock, clock) = mock();
        let timings = TapTimings::new();
        let hook: Hook<(u32,)> = Hook::sync();
        ProfilingInterceptor::new(&timings).with_clock(clock).attach(&hook).unwrap();
        ticking_tap(&hook, "a", &mock, 2);

        hook.call((0,)).unwrap();
        assert_eq!(timings.tap(&hook.label(), "a").unwrap().calls, 1);
        assert_eq!(timings.hook("anonymous").unwrap().invocations, 1);
    }

    #[test]
    fn parallel_kinds_only_record_invocations() {
        let (mock, clock) = mock();
        let timings = TapTimings::new();
        let hook: Hook<(u32,)> = Hook::async_parallel().named("emit");
        ProfilingInterceptor::new(&timings).with_clock(clock).attach(&hook).unwrap();
        ticking_tap(&hook, "a", &mock, 4);
        ticking_tap(&hook, "b", &mock, 4);

        hook.call((0,)).unwrap();
        assert!(timings.report().taps.is_empty());
        assert_eq!(timings.hook("emit").unwrap().total, Duration::from_millis(8));
    }

    #[test]
    fn report_serializes_microseconds() {
        let timings = TapTimings::new();
        timings.record_tap("h", "t", Duration::from_millis(2));
        timings.record_invocation("h", Duration::from_millis(2), false);

        let json: serde_json::Value = serde_json::from_str(&timings.to_json().unwrap()).unwrap();
        assert_eq!(json["taps"][0]["total_us"], 2000);
        assert_eq!(json["hooks"][0]["invocations"], 1);

        timings.reset();
        assert_eq!(timings.report(), ProfileReport::default());
    }
}
