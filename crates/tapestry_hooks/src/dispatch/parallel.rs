//! Async parallel variants.
//!
//! Every tap is started, in call order, before the first one is polled.
//! Outcomes are then consumed in completion order.

use futures::StreamExt;
use futures::future;
use futures::stream::FuturesUnordered;

use crate::args::{HookArgs, HookOutput};
use crate::context::TapContext;
use crate::plan::{ExecutionPlan, StepOutcome};
use crate::tap::BoxFuture;

type Pending<R> = FuturesUnordered<BoxFuture<'static, StepOutcome<R>>>;

fn start_all<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> Pending<R> {
    plan.steps.iter().map(|step| step.start(ctx, args)).collect()
}

/// Waits for every tap; the first failure to settle is reported.
pub(super) async fn parallel<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    let mut pending = start_all(plan, ctx, args);
    let mut first_error = None;
    while let Some(outcome) = pending.next().await {
        if let Err(err) = outcome {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(None),
    }
}

/// Settles on the first defined value or failure.
pub(super) async fn bail<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    let mut pending = start_all(plan, ctx, args);
    while let Some(outcome) = pending.next().await {
        if matches!(outcome, Ok(None)) {
            continue;
        }
        detach(&plan.hook, pending);
        return outcome;
    }
    Ok(None)
}

/// Lets taps still in flight run to completion, discarding their outcomes.
fn detach<R: HookOutput>(hook: &str, pending: Pending<R>) {
    if pending.is_empty() {
        return;
    }
    let in_flight = pending.len();
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            tracing::trace!(hook, in_flight, "detaching in-flight taps");
            handle.spawn(pending.for_each(|_| future::ready(())));
        }
        Err(_) => {
            tracing::warn!(
                hook,
                in_flight,
                "no tokio runtime to detach onto, dropping in-flight taps"
            );
        }
    }
}
