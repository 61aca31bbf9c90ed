//! The cached execution plan of a hook.
//!
//! A plan is derived from the registry and the interceptor chain and is
//! rebuilt whenever the hook's version moves. Every invocation clones the
//! current plan's `Arc` once and runs against that snapshot for its whole
//! duration, so taps registered mid-invocation only affect later calls.

use std::sync::Arc;

use futures::channel::oneshot;
use futures::future;

use crate::args::{HookArgs, HookOutput};
use crate::context::TapContext;
use crate::dispatch::Dispatch;
use crate::error::HookError;
use crate::hook::HookKind;
use crate::interceptor::{InterceptorChain, Lanes, Named, TapFn, for_each_tap};
use crate::registry::TapRegistry;
use crate::tap::{BoxFuture, Continuation, TapCallback, TapId, TapInfo, TapKind};

/// Outcome of one step: the tap's defined value, if any.
pub(crate) type StepOutcome<R> = Result<Option<R>, HookError>;

// ─────────────────────────────────────────────────────────────────────────────
// Step
// ─────────────────────────────────────────────────────────────────────────────

/// One tap, bound to the `tap` interceptors that surround it.
pub(crate) struct Step<A, R> {
    pub(crate) info: TapInfo,
    callback: TapCallback<A, R>,
    /// `None` when no interceptor defines a `tap` callback.
    intercept: Option<Arc<[Named<TapFn>]>>,
}

impl<A: HookArgs, R: HookOutput> Step<A, R> {
    fn before_tap(&self, ctx: &TapContext) -> Result<(), HookError> {
        match &self.intercept {
            Some(lane) => for_each_tap(lane, ctx, &self.info),
            None => Ok(()),
        }
    }

    /// Runs a sync tap on the caller's stack.
    pub(crate) fn run_sync(&self, hook: &str, ctx: &TapContext, args: &A) -> StepOutcome<R> {
        self.before_tap(ctx)?;
        match &self.callback {
            TapCallback::Sync(f) => {
                f(ctx, args).map_err(|source| HookError::tap(self.info.name(), source))
            }
            other => Err(HookError::SyncCallOnAsyncHook {
                hook: hook.to_owned(),
                tap: self.info.name().to_owned(),
                kind: other.kind(),
            }),
        }
    }

    /// Invokes the tap now and returns a future for its settlement.
    ///
    /// The tap callback itself runs before this returns, which is what lets
    /// parallel hooks start every tap within one turn.
    pub(crate) fn start(&self, ctx: &TapContext, args: &A) -> BoxFuture<'static, StepOutcome<R>> {
        if let Err(err) = self.before_tap(ctx) {
            return Box::pin(future::ready(Err(err)));
        }

        match &self.callback {
            TapCallback::Sync(f) => {
                let outcome = f(ctx, args).map_err(|source| HookError::tap(self.info.name(), source));
                Box::pin(future::ready(outcome))
            }
            TapCallback::Callback(f) => {
                let (done, receiver) = Continuation::channel();
                f(ctx.clone(), args.clone(), done);
                let tap = self.info.name().to_owned();
                Box::pin(async move {
                    match receiver.await {
                        Ok(result) => result.map_err(|source| HookError::tap(&tap, source)),
                        Err(oneshot::Canceled) => Err(HookError::ContinuationDropped { tap }),
                    }
                })
            }
            TapCallback::Promise(f) => {
                let pending = f(ctx.clone(), args.clone());
                let tap = self.info.name().to_owned();
                Box::pin(async move { pending.await.map_err(|source| HookError::tap(&tap, source)) })
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ExecutionPlan
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one invocation needs, frozen at build time.
pub(crate) struct ExecutionPlan<A, R> {
    pub(crate) version: u64,
    pub(crate) hook: Arc<str>,
    pub(crate) dispatch: Dispatch<A, R>,
    pub(crate) steps: Vec<Step<A, R>>,
    pub(crate) lanes: Lanes<A, R>,
    pub(crate) needs_context: bool,
    /// First non-sync tap in call order.
    pub(crate) first_async: Option<(String, TapKind)>,
    pub(crate) max_loop_passes: Option<usize>,
}

impl<A: HookArgs, R: HookOutput> ExecutionPlan<A, R> {
    pub(crate) fn build(
        hook: Arc<str>,
        dispatch: Dispatch<A, R>,
        version: u64,
        registry: &mut TapRegistry<A, R>,
        interceptors: &InterceptorChain<A, R>,
        max_loop_passes: Option<usize>,
    ) -> Result<Self, HookError> {
        let order = registry.order(&hook)?;
        let lanes = interceptors.lanes();
        let intercept = (!lanes.tap.is_empty()).then(|| Arc::clone(&lanes.tap));

        let entries = registry.entries();
        let steps: Vec<Step<A, R>> = order
            .into_iter()
            .map(|index| Step {
                info: entries[index].info.clone(),
                callback: entries[index].callback.clone(),
                intercept: intercept.clone(),
            })
            .collect();

        let first_async = steps
            .iter()
            .find(|step| !step.info.kind().is_sync())
            .map(|step| (step.info.name().to_owned(), step.info.kind()));
        let needs_context =
            interceptors.wants_context() || steps.iter().any(|step| step.info.wants_context());

        tracing::debug!(
            hook = %hook,
            version,
            taps = steps.len(),
            interceptors = interceptors.len(),
            needs_context,
            "execution plan rebuilt"
        );

        Ok(Self {
            version,
            hook,
            dispatch,
            steps,
            lanes,
            needs_context,
            first_async,
            max_loop_passes,
        })
    }

    pub(crate) fn all_sync(&self) -> bool {
        self.first_async.is_none()
    }

    /// Fresh context for one invocation.
    pub(crate) fn context(&self) -> TapContext {
        if self.needs_context {
            TapContext::new()
        } else {
            TapContext::detached()
        }
    }

    pub(crate) fn summary(&self) -> PlanSummary {
        PlanSummary {
            version: self.version,
            kind: self.dispatch.kind(),
            taps: self.steps.iter().map(|step| step.info.id()).collect(),
            tap_names: self
                .steps
                .iter()
                .map(|step| step.info.name().to_owned())
                .collect(),
            intercepted: !self.lanes.is_empty(),
            needs_context: self.needs_context,
            all_sync: self.all_sync(),
        }
    }
}

/// A read-only description of a hook's current execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    /// Hook version the plan was built for.
    pub version: u64,
    /// The hook's dispatch variant.
    pub kind: HookKind,
    /// Tap ids in call order.
    pub taps: Vec<TapId>,
    /// Tap names in call order.
    pub tap_names: Vec<String>,
    /// Whether any interceptor callback takes part in invocations.
    pub intercepted: bool,
    /// Whether invocations allocate a live [`TapContext`].
    pub needs_context: bool,
    /// Whether every tap is sync, making the sync entry point available.
    pub all_sync: bool,
}
