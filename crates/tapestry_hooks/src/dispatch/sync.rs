//! Variants run on the caller's stack.
//!
//! Used for the sync hook kinds and for async kinds whose taps all happen to
//! be sync. A sync tap settles the moment it starts, so completion order is
//! start order. Parallel kinds still start every tap, as they would with
//! asynchronous taps present.

use crate::args::{HookArgs, HookOutput, WaterfallOps};
use crate::context::TapContext;
use crate::dispatch::Dispatch;
use crate::plan::{ExecutionPlan, StepOutcome};

pub(super) fn run<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: A,
) -> StepOutcome<R> {
    match plan.dispatch {
        Dispatch::Sync | Dispatch::AsyncSeries => series(plan, ctx, &args),
        Dispatch::SyncBail | Dispatch::AsyncSeriesBail => bail(plan, ctx, &args),
        Dispatch::AsyncParallel => parallel(plan, ctx, &args),
        Dispatch::AsyncParallelBail => parallel_bail(plan, ctx, &args),
        Dispatch::SyncWaterfall(ops) | Dispatch::AsyncSeriesWaterfall(ops) => {
            waterfall(plan, ctx, args, ops)
        }
        Dispatch::SyncLoop | Dispatch::AsyncSeriesLoop => looping(plan, ctx, &args),
    }
}

fn series<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    for step in &plan.steps {
        step.run_sync(&plan.hook, ctx, args)?;
    }
    Ok(None)
}

fn bail<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    for step in &plan.steps {
        if let Some(value) = step.run_sync(&plan.hook, ctx, args)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

/// Runs every tap; the first failure is reported.
fn parallel<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    let mut first_error = None;
    for step in &plan.steps {
        if let Err(err) = step.run_sync(&plan.hook, ctx, args) {
            first_error.get_or_insert(err);
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(None),
    }
}

/// Runs every tap; the first defined value or failure settles the call.
fn parallel_bail<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    let mut settled = None;
    for step in &plan.steps {
        let outcome = step.run_sync(&plan.hook, ctx, args);
        if settled.is_none() && !matches!(outcome, Ok(None)) {
            settled = Some(outcome);
        }
    }
    settled.unwrap_or(Ok(None))
}

fn waterfall<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    mut args: A,
    ops: WaterfallOps<A, R>,
) -> StepOutcome<R> {
    for step in &plan.steps {
        if let Some(value) = step.run_sync(&plan.hook, ctx, &args)? {
            (ops.replace)(&mut args, value);
        }
    }
    Ok(Some((ops.finish)(args)))
}

fn looping<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    let mut pass = 0;
    'pass: loop {
        pass += 1;
        plan.check_pass(pass)?;
        plan.lanes.for_each_loop(ctx, args)?;
        for step in &plan.steps {
            if step.run_sync(&plan.hook, ctx, args)?.is_some() {
                continue 'pass;
            }
        }
        return Ok(None);
    }
}
