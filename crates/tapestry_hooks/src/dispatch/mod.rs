//! Dispatch variants.
//!
//! Every invocation follows the same skeleton:
//!
//! 1. `call` interceptors see the arguments.
//! 2. The plan's steps run under the hook's [`Dispatch`] variant.
//! 3. On success `result` (when a value was produced) and then `done`
//!    interceptors fire. On a tap failure `error` interceptors fire.
//!
//! The variant algorithms live in [`sync`] (the caller's stack, used whenever
//! every tap is sync), [`series`] and [`parallel`].

mod parallel;
mod series;
mod sync;

use std::sync::Arc;

use crate::args::{HookArgs, HookOutput, WaterfallOps};
use crate::context::TapContext;
use crate::error::HookError;
use crate::hook::HookKind;
use crate::plan::{ExecutionPlan, StepOutcome};

/// The dispatch variant of a hook, with whatever the variant needs baked in.
pub(crate) enum Dispatch<A, R> {
    Sync,
    SyncBail,
    SyncWaterfall(WaterfallOps<A, R>),
    SyncLoop,
    AsyncParallel,
    AsyncParallelBail,
    AsyncSeries,
    AsyncSeriesBail,
    AsyncSeriesWaterfall(WaterfallOps<A, R>),
    AsyncSeriesLoop,
}

impl<A, R> Dispatch<A, R> {
    pub(crate) fn kind(&self) -> HookKind {
        match self {
            Dispatch::Sync => HookKind::Sync,
            Dispatch::SyncBail => HookKind::SyncBail,
            Dispatch::SyncWaterfall(_) => HookKind::SyncWaterfall,
            Dispatch::SyncLoop => HookKind::SyncLoop,
            Dispatch::AsyncParallel => HookKind::AsyncParallel,
            Dispatch::AsyncParallelBail => HookKind::AsyncParallelBail,
            Dispatch::AsyncSeries => HookKind::AsyncSeries,
            Dispatch::AsyncSeriesBail => HookKind::AsyncSeriesBail,
            Dispatch::AsyncSeriesWaterfall(_) => HookKind::AsyncSeriesWaterfall,
            Dispatch::AsyncSeriesLoop => HookKind::AsyncSeriesLoop,
        }
    }
}

impl<A, R> Clone for Dispatch<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for Dispatch<A, R> {}

impl<A: HookArgs, R: HookOutput> ExecutionPlan<A, R> {
    /// Runs the whole invocation on the caller's stack.
    ///
    /// Only called when every tap is sync.
    pub(crate) fn run_inline(&self, args: A) -> StepOutcome<R> {
        tracing::trace!(hook = %self.hook, kind = %self.dispatch.kind(), taps = self.steps.len(), "dispatch inline");
        let ctx = self.context();
        let outcome = match self.lanes.for_each_call(&ctx, &args) {
            Ok(()) => sync::run(self, &ctx, args),
            Err(err) => Err(err),
        };
        self.finish(&ctx, outcome)
    }

    /// Runs the whole invocation, awaiting asynchronous taps.
    pub(crate) async fn run_async(self: Arc<Self>, args: A) -> StepOutcome<R> {
        tracing::trace!(hook = %self.hook, kind = %self.dispatch.kind(), taps = self.steps.len(), "dispatch async");
        let ctx = self.context();
        let outcome = match self.lanes.for_each_call(&ctx, &args) {
            Ok(()) => match self.dispatch {
                Dispatch::Sync | Dispatch::AsyncSeries => series::series(&self, &ctx, &args).await,
                Dispatch::SyncBail | Dispatch::AsyncSeriesBail => {
                    series::bail(&self, &ctx, &args).await
                }
                Dispatch::SyncWaterfall(ops) | Dispatch::AsyncSeriesWaterfall(ops) => {
                    series::waterfall(&self, &ctx, args, ops).await
                }
                Dispatch::SyncLoop | Dispatch::AsyncSeriesLoop => {
                    series::looping(&self, &ctx, &args).await
                }
                Dispatch::AsyncParallel => parallel::parallel(&self, &ctx, &args).await,
                Dispatch::AsyncParallelBail => parallel::bail(&self, &ctx, &args).await,
            },
            Err(err) => Err(err),
        };
        self.finish(&ctx, outcome)
    }

    /// Runs the closing interceptors for an outcome.
    fn finish(&self, ctx: &TapContext, outcome: StepOutcome<R>) -> StepOutcome<R> {
        match outcome {
            Ok(result) => {
                if let Some(value) = &result {
                    self.lanes.for_each_result(ctx, value)?;
                }
                self.lanes.for_each_done(ctx)?;
                Ok(result)
            }
            Err(err) => {
                // interceptor failures abort without the error lane
                if !matches!(err, HookError::Interceptor { .. }) {
                    self.lanes.for_each_error(ctx, &err);
                }
                Err(err)
            }
        }
    }

    /// Checks the loop pass limit before pass number `pass` (1-based).
    fn check_pass(&self, pass: usize) -> Result<(), HookError> {
        match self.max_loop_passes {
            Some(max) if pass > max => Err(HookError::LoopLimitExceeded {
                hook: self.hook.to_string(),
                max,
            }),
            _ => Ok(()),
        }
    }
}
