//! The [`Hook`] handle: registration, interception and invocation.

use core::fmt;
use core::future::Future;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::args::{HookArgs, HookOutput, WaterfallArgs, WaterfallOps};
use crate::context::TapContext;
use crate::dispatch::Dispatch;
use crate::error::HookError;
use crate::interceptor::{Interceptor, InterceptorChain, apply_register};
use crate::plan::{ExecutionPlan, PlanSummary};
use crate::registry::{TapRegistry, validate};
use crate::tap::{
    BoxFuture, Continuation, TapCallback, TapHandle, TapId, TapInfo, TapOptions, TapOwner,
    TapResult,
};

const ANONYMOUS: &str = "anonymous";

// ─────────────────────────────────────────────────────────────────────────────
// HookKind
// ─────────────────────────────────────────────────────────────────────────────

/// The dispatch variant of a hook, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// Taps run in order; results are ignored.
    Sync,
    /// Taps run in order until one returns a value.
    SyncBail,
    /// Each returned value replaces the first argument of the next tap.
    SyncWaterfall,
    /// Passes restart whenever a tap returns a value.
    SyncLoop,
    /// All taps start at once; the call waits for all of them.
    AsyncParallel,
    /// All taps start at once; the first value or failure settles the call.
    AsyncParallelBail,
    /// Taps run one at a time, each awaited.
    AsyncSeries,
    /// Like [`SyncBail`](Self::SyncBail), one awaited tap at a time.
    AsyncSeriesBail,
    /// Like [`SyncWaterfall`](Self::SyncWaterfall), one awaited tap at a time.
    AsyncSeriesWaterfall,
    /// Like [`SyncLoop`](Self::SyncLoop), one awaited tap at a time.
    AsyncSeriesLoop,
}

impl HookKind {
    /// Returns `true` if callback and promise taps may be registered.
    #[must_use]
    pub fn is_async(self) -> bool {
        !matches!(
            self,
            HookKind::Sync | HookKind::SyncBail | HookKind::SyncWaterfall | HookKind::SyncLoop
        )
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook state
// ─────────────────────────────────────────────────────────────────────────────

struct HookState<A, R> {
    name: Option<Arc<str>>,
    params: Vec<String>,
    max_loop_passes: Option<usize>,
    registry: TapRegistry<A, R>,
    interceptors: InterceptorChain<A, R>,
    /// Bumped on every mutation that can change the plan.
    version: u64,
    plan: Option<Arc<ExecutionPlan<A, R>>>,
}

impl<A, R> HookState<A, R> {
    fn label(&self) -> Arc<str> {
        self.name.clone().unwrap_or_else(|| Arc::from(ANONYMOUS))
    }
}

struct HookInner<A, R> {
    dispatch: Dispatch<A, R>,
    state: Mutex<HookState<A, R>>,
}

impl<A: HookArgs, R: HookOutput> TapOwner for HookInner<A, R> {
    fn remove_tap(&self, id: TapId) -> bool {
        let mut state = self.state.lock();
        let removed = state.registry.remove(id);
        if removed {
            state.version += 1;
            tracing::debug!(hook = %state.label(), %id, "tap unregistered");
        }
        removed
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook
// ─────────────────────────────────────────────────────────────────────────────

/// A named extension point with one fixed dispatch variant.
///
/// `A` is the argument tuple every tap receives and `R` the value taps may
/// return. Cloning a `Hook` yields another handle to the same hook.
///
/// # Example
///
/// ```
/// use tapestry_hooks::Hook;
///
/// let resolve: Hook<(String,), String> = Hook::sync_bail().named("resolve");
/// resolve.tap("alias", |(request,)| {
///     Ok((request == "@app").then(|| "./src/app".to_string()))
/// })?;
/// resolve.tap("fallback", |(request,)| Ok(Some(request.clone())))?;
///
/// assert_eq!(resolve.call(("@app".into(),))?, Some("./src/app".into()));
/// assert_eq!(resolve.call(("lodash".into(),))?, Some("lodash".into()));
/// # Ok::<(), tapestry_hooks::HookError>(())
/// ```
pub struct Hook<A, R = ()> {
    inner: Arc<HookInner<A, R>>,
}

impl<A, R> Clone for Hook<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: HookArgs, R: HookOutput> Hook<A, R> {
    fn with_dispatch(dispatch: Dispatch<A, R>) -> Self {
        Self {
            inner: Arc::new(HookInner {
                dispatch,
                state: Mutex::new(HookState {
                    name: None,
                    params: Vec::new(),
                    max_loop_passes: None,
                    registry: TapRegistry::default(),
                    interceptors: InterceptorChain::default(),
                    version: 0,
                    plan: None,
                }),
            }),
        }
    }

    /// Creates a [`HookKind::Sync`] hook.
    #[must_use]
    pub fn sync() -> Self {
        Self::with_dispatch(Dispatch::Sync)
    }

    /// Creates a [`HookKind::SyncBail`] hook.
    #[must_use]
    pub fn sync_bail() -> Self {
        Self::with_dispatch(Dispatch::SyncBail)
    }

    /// Creates a [`HookKind::SyncLoop`] hook.
    #[must_use]
    pub fn sync_loop() -> Self {
        Self::with_dispatch(Dispatch::SyncLoop)
    }

    /// Creates a [`HookKind::AsyncParallel`] hook.
    #[must_use]
    pub fn async_parallel() -> Self {
        Self::with_dispatch(Dispatch::AsyncParallel)
    }

    /// Creates a [`HookKind::AsyncParallelBail`] hook.
    #[must_use]
    pub fn async_parallel_bail() -> Self {
        Self::with_dispatch(Dispatch::AsyncParallelBail)
    }

    /// Creates a [`HookKind::AsyncSeries`] hook.
    #[must_use]
    pub fn async_series() -> Self {
        Self::with_dispatch(Dispatch::AsyncSeries)
    }

    /// Creates a [`HookKind::AsyncSeriesBail`] hook.
    #[must_use]
    pub fn async_series_bail() -> Self {
        Self::with_dispatch(Dispatch::AsyncSeriesBail)
    }

    /// Creates a [`HookKind::AsyncSeriesLoop`] hook.
    #[must_use]
    pub fn async_series_loop() -> Self {
        Self::with_dispatch(Dispatch::AsyncSeriesLoop)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────

    /// Sets the name used in diagnostics and errors.
    #[must_use]
    pub fn named(self, name: impl Into<String>) -> Self {
        {
            let mut state = self.inner.state.lock();
            state.name = Some(Arc::from(name.into()));
            state.version += 1;
        }
        self
    }

    /// Records the formal parameter names of the hook's arguments.
    ///
    /// Purely descriptive; nothing checks them at call time.
    #[must_use]
    pub fn with_params<I, S>(self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.state.lock().params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Caps the number of passes a loop hook may run before failing with
    /// [`HookError::LoopLimitExceeded`]. Unbounded by default.
    #[must_use]
    pub fn with_max_loop_passes(self, max: usize) -> Self {
        {
            let mut state = self.inner.state.lock();
            state.max_loop_passes = Some(max);
            state.version += 1;
        }
        self
    }

    /// Returns the hook's dispatch variant.
    #[must_use]
    pub fn kind(&self) -> HookKind {
        self.inner.dispatch.kind()
    }

    /// Returns the hook's name, if one was set.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.inner.state.lock().name.as_deref().map(str::to_owned)
    }

    /// Returns the name used in errors and logs: the hook's name, or
    /// `"anonymous"` if none was set.
    #[must_use]
    pub fn label(&self) -> String {
        self.inner.state.lock().label().to_string()
    }

    /// Returns the formal parameter names.
    #[must_use]
    pub fn params(&self) -> Vec<String> {
        self.inner.state.lock().params.clone()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a sync tap.
    pub fn tap<F>(&self, options: impl Into<TapOptions>, f: F) -> Result<TapHandle, HookError>
    where
        F: Fn(&A) -> TapResult<R> + Send + Sync + 'static,
    {
        let callback = TapCallback::Sync(Arc::new(move |_: &TapContext, args: &A| f(args)));
        self.register(false, options.into(), callback)
    }

    /// Registers a sync tap that receives the invocation's [`TapContext`].
    pub fn tap_with_context<F>(
        &self,
        options: impl Into<TapOptions>,
        f: F,
    ) -> Result<TapHandle, HookError>
    where
        F: Fn(&TapContext, &A) -> TapResult<R> + Send + Sync + 'static,
    {
        self.register(true, options.into(), TapCallback::Sync(Arc::new(f)))
    }

    /// Registers a callback-style tap that completes through a
    /// [`Continuation`]. Only async hook kinds accept it.
    pub fn tap_callback<F>(
        &self,
        options: impl Into<TapOptions>,
        f: F,
    ) -> Result<TapHandle, HookError>
    where
        F: Fn(A, Continuation<R>) + Send + Sync + 'static,
    {
        let callback = TapCallback::Callback(Arc::new(
            move |_: TapContext, args: A, done: Continuation<R>| f(args, done),
        ));
        self.register(false, options.into(), callback)
    }

    /// Registers a callback-style tap that receives the invocation's
    /// [`TapContext`].
    pub fn tap_callback_with_context<F>(
        &self,
        options: impl Into<TapOptions>,
        f: F,
    ) -> Result<TapHandle, HookError>
    where
        F: Fn(TapContext, A, Continuation<R>) + Send + Sync + 'static,
    {
        self.register(true, options.into(), TapCallback::Callback(Arc::new(f)))
    }

    /// Registers a promise-style tap whose future is awaited. Only async hook
    /// kinds accept it.
    pub fn tap_promise<F, Fut>(
        &self,
        options: impl Into<TapOptions>,
        f: F,
    ) -> Result<TapHandle, HookError>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TapResult<R>> + Send + 'static,
    {
        let callback = TapCallback::Promise(Arc::new(move |_: TapContext, args: A| {
            Box::pin(f(args)) as BoxFuture<'static, TapResult<R>>
        }));
        self.register(false, options.into(), callback)
    }

    /// Registers a promise-style tap that receives the invocation's
    /// [`TapContext`].
    pub fn tap_promise_with_context<F, Fut>(
        &self,
        options: impl Into<TapOptions>,
        f: F,
    ) -> Result<TapHandle, HookError>
    where
        F: Fn(TapContext, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TapResult<R>> + Send + 'static,
    {
        let callback = TapCallback::Promise(Arc::new(move |ctx: TapContext, args: A| {
            Box::pin(f(ctx, args)) as BoxFuture<'static, TapResult<R>>
        }));
        self.register(true, options.into(), callback)
    }

    fn register(
        &self,
        context: bool,
        options: TapOptions,
        callback: TapCallback<A, R>,
    ) -> Result<TapHandle, HookError> {
        let kind = callback.kind();
        let (label, registrars) = {
            let state = self.inner.state.lock();
            (state.label(), state.interceptors.registrars())
        };

        validate(&label, &options)?;
        if !kind.is_sync() && !self.kind().is_async() {
            return Err(HookError::InvalidTap {
                hook: label.to_string(),
                reason: format!("{kind} taps are not supported by {} hooks", self.kind()),
            });
        }

        // register interceptors run unlocked
        let options = apply_register(&registrars, options)?;

        let mut state = self.inner.state.lock();
        let info = state
            .registry
            .insert(&label, kind, context, options, callback)?;
        state.version += 1;
        tracing::debug!(
            hook = %label,
            tap = info.name(),
            id = %info.id(),
            %kind,
            stage = info.stage(),
            "tap registered"
        );

        Ok(TapHandle::new(info.id(), info.name(), self.owner()))
    }

    fn owner(&self) -> Weak<dyn TapOwner> {
        let weak: Weak<HookInner<A, R>> = Arc::downgrade(&self.inner);
        weak
    }

    /// Removes the tap with the given id. Returns `false` if there is none.
    pub fn untap(&self, id: TapId) -> bool {
        self.inner.remove_tap(id)
    }

    /// Removes every tap. Interceptors stay attached.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.registry.clear();
        state.version += 1;
        tracing::debug!(hook = %state.label(), "taps cleared");
    }

    /// Attaches an interceptor.
    ///
    /// The interceptor's `register` callback is first run over every tap
    /// already registered, so it sees the same taps it would have seen had it
    /// been attached first. If that fails nothing changes.
    pub fn intercept(&self, interceptor: Interceptor<A, R>) -> Result<(), HookError> {
        let (label, existing) = {
            let state = self.inner.state.lock();
            let existing: Vec<(TapId, TapOptions)> = state
                .registry
                .entries()
                .iter()
                .map(|entry| (entry.info.id(), entry.info.options().clone()))
                .collect();
            (state.label(), existing)
        };

        let mut rewritten = Vec::new();
        if let Some(registrar) = interceptor.registrar() {
            for (id, options) in existing {
                let options = apply_register(core::slice::from_ref(&registrar), options)?;
                validate(&label, &options)?;
                rewritten.push((id, options));
            }
        }

        let mut state = self.inner.state.lock();
        for (id, options) in rewritten {
            // taps removed in the meantime are skipped
            state.registry.rewrite(&label, id, options)?;
        }
        tracing::debug!(hook = %label, interceptor = interceptor.name(), "interceptor attached");
        state.interceptors.attach(interceptor);
        state.version += 1;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────

    /// Returns `true` if the hook has any tap or interceptor.
    #[must_use]
    pub fn is_used(&self) -> bool {
        let state = self.inner.state.lock();
        !state.registry.is_empty() || state.interceptors.len() > 0
    }

    /// Returns the number of registered taps.
    #[must_use]
    pub fn tap_count(&self) -> usize {
        self.inner.state.lock().registry.len()
    }

    /// Returns the registered taps in registration order.
    #[must_use]
    pub fn taps(&self) -> Vec<TapInfo> {
        let state = self.inner.state.lock();
        state
            .registry
            .entries()
            .iter()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Returns the registered taps in call order.
    pub fn materialized_order(&self) -> Result<Vec<TapInfo>, HookError> {
        let mut state = self.inner.state.lock();
        let label = state.label();
        state.registry.materialized_order(&label)
    }

    /// Describes the current execution plan, building it if needed.
    pub fn plan(&self) -> Result<PlanSummary, HookError> {
        Ok(self.current_plan()?.summary())
    }

    fn current_plan(&self) -> Result<Arc<ExecutionPlan<A, R>>, HookError> {
        let mut state = self.inner.state.lock();
        if let Some(plan) = &state.plan
            && plan.version == state.version
        {
            return Ok(Arc::clone(plan));
        }

        let label = state.label();
        let version = state.version;
        let max_loop_passes = state.max_loop_passes;
        let HookState {
            registry,
            interceptors,
            ..
        } = &mut *state;
        let plan = Arc::new(ExecutionPlan::build(
            label,
            self.inner.dispatch,
            version,
            registry,
            interceptors,
            max_loop_passes,
        )?);
        state.plan = Some(Arc::clone(&plan));
        Ok(plan)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Invocation
    // ─────────────────────────────────────────────────────────────────────

    /// Invokes the hook on the caller's stack.
    ///
    /// Works for every hook kind as long as every registered tap is sync;
    /// otherwise fails with [`HookError::SyncCallOnAsyncHook`] before any tap
    /// runs.
    pub fn call(&self, args: A) -> Result<Option<R>, HookError> {
        let plan = self.current_plan()?;
        if let Some((tap, kind)) = &plan.first_async {
            return Err(HookError::SyncCallOnAsyncHook {
                hook: plan.hook.to_string(),
                tap: tap.clone(),
                kind: *kind,
            });
        }
        plan.run_inline(args)
    }

    /// Invokes the hook, returning a future for the outcome.
    ///
    /// The plan is taken when this is called, not when the future is first
    /// polled; wiring errors are delivered through the future.
    pub fn call_async(
        &self,
        args: A,
    ) -> impl Future<Output = Result<Option<R>, HookError>> + Send + 'static {
        let plan = self.current_plan();
        async move {
            let plan = plan?;
            if plan.all_sync() {
                plan.run_inline(args)
            } else {
                plan.run_async(args).await
            }
        }
    }

    /// Invokes the hook and hands the outcome to `callback`.
    ///
    /// When every tap is sync the callback runs before this returns.
    /// Otherwise the invocation is spawned on the current tokio runtime; with
    /// no runtime the callback receives [`HookError::NoRuntime`].
    pub fn call_with<F>(&self, args: A, callback: F)
    where
        F: FnOnce(Result<Option<R>, HookError>) + Send + 'static,
    {
        let plan = match self.current_plan() {
            Ok(plan) => plan,
            Err(err) => return callback(Err(err)),
        };
        if plan.all_sync() {
            return callback(plan.run_inline(args));
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { callback(plan.run_async(args).await) });
            }
            Err(_) => callback(Err(HookError::NoRuntime {
                hook: plan.hook.to_string(),
            })),
        }
    }
}

impl<A: HookArgs, R: HookOutput> Hook<A, R>
where
    A: WaterfallArgs<R>,
{
    /// Creates a [`HookKind::SyncWaterfall`] hook.
    #[must_use]
    pub fn sync_waterfall() -> Self {
        Self::with_dispatch(Dispatch::SyncWaterfall(WaterfallOps::new()))
    }

    /// Creates a [`HookKind::AsyncSeriesWaterfall`] hook.
    #[must_use]
    pub fn async_series_waterfall() -> Self {
        Self::with_dispatch(Dispatch::AsyncSeriesWaterfall(WaterfallOps::new()))
    }
}

impl<A, R> fmt::Debug for Hook<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Hook")
            .field("name", &state.name)
            .field("kind", &self.inner.dispatch.kind())
            .field("taps", &state.registry.len())
            .field("interceptors", &state.interceptors.len())
            .field("version", &state.version)
            .finish()
    }
}
