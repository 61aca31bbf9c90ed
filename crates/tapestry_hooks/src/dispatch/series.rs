//! Async series variants: one tap at a time, each awaited before the next.

use crate::args::{HookArgs, HookOutput, WaterfallOps};
use crate::context::TapContext;
use crate::plan::{ExecutionPlan, StepOutcome};

pub(super) async fn series<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    for step in &plan.steps {
        step.start(ctx, args).await?;
    }
    Ok(None)
}

pub(super) async fn bail<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    args: &A,
) -> StepOutcome<R> {
    for step in &plan.steps {
        if let Some(value) = step.start(ctx, args).await? {
            tracing::trace!(hook = %plan.hook, tap = step.info.name(), "series bailed");
            return Ok(Some(value));
        }
    }
    Ok(None)
}

pub(super) async fn waterfall<A: HookArgs, R: HookOutput>(
    plan: &ExecutionPlan<A, R>,
    ctx: &TapContext,
    mut args: A,
    ops: WaterfallOps<A, R>,
) -> StepOutcome<R> {
    for step in &plan.steps {
        if let Some(value) = step.start(ctx, &args).await? {
            (ops.replace)(&mut args, value);
        }
    }
    Ok(Some((ops.finish)(args)))
}

pub(super) async fn looping<A: HookArgs, R: HookOutput>(
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
            if step.start(ctx, args).await?.is_some() {
                continue 'pass;
            }
        }
        return Ok(None);
    }
}
