//! Interceptors: cross-cutting observers attached to a hook.
//!
//! An [`Interceptor`] is a named bag of optional callbacks. Only the callbacks
//! an interceptor actually defines end up in the execution plan; a hook whose
//! interceptors define no `tap` callback pays nothing per tap.
//!
//! # Lifecycle
//!
//! | Callback | Fires | Can fail |
//! |----------|-------|----------|
//! | `register` | when a tap is added, and over existing taps on attach | yes |
//! | `call` | once per invocation, before any tap | yes |
//! | `tap` | before each tap is invoked | yes |
//! | `loop` | at the start of every pass of a loop hook | yes |
//! | `result` | when the invocation produced a value | yes |
//! | `error` | when a tap failed | no |
//! | `done` | when the invocation completed successfully | yes |
//!
//! Callbacks run in attachment order. A failing callback aborts the
//! invocation with [`HookError::Interceptor`]; `error` callbacks are not run
//! for interceptor failures.
//!
//! # Example
//!
//! ```
//! use tapestry_hooks::{Hook, Interceptor};
//!
//! let hook: Hook<(u32,)> = Hook::sync();
//! hook.intercept(
//!     Interceptor::new("late-by-default")
//!         .on_register(|mut options| {
//!             options.stage = 100;
//!             Ok(options)
//!         })
//!         .on_tap(|_ctx, tap| {
//!             println!("running {}", tap.name());
//!             Ok(())
//!         }),
//! )?;
//! # Ok::<(), tapestry_hooks::HookError>(())
//! ```

use core::fmt;
use std::sync::Arc;

use crate::context::TapContext;
use crate::error::{BoxError, HookError, InterceptStage};
use crate::tap::{TapInfo, TapOptions};

pub(crate) type RegisterFn =
    Arc<dyn Fn(TapOptions) -> Result<TapOptions, BoxError> + Send + Sync>;
pub(crate) type CallFn<A> = Arc<dyn Fn(&TapContext, &A) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type TapFn = Arc<dyn Fn(&TapContext, &TapInfo) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type ResultFn<R> = Arc<dyn Fn(&TapContext, &R) -> Result<(), BoxError> + Send + Sync>;
pub(crate) type ErrorFn = Arc<dyn Fn(&TapContext, &HookError) + Send + Sync>;
pub(crate) type DoneFn = Arc<dyn Fn(&TapContext) -> Result<(), BoxError> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Interceptor
// ─────────────────────────────────────────────────────────────────────────────

/// A named set of optional lifecycle callbacks.
pub struct Interceptor<A, R = ()> {
    name: Arc<str>,
    context: bool,
    register: Option<RegisterFn>,
    call: Option<CallFn<A>>,
    tap: Option<TapFn>,
    loop_pass: Option<CallFn<A>>,
    result: Option<ResultFn<R>>,
    error: Option<ErrorFn>,
    done: Option<DoneFn>,
}

impl<A, R> Interceptor<A, R> {
    /// Creates an interceptor with no callbacks.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            context: false,
            register: None,
            call: None,
            tap: None,
            loop_pass: None,
            result: None,
            error: None,
            done: None,
        }
    }

    /// Returns the interceptor's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether this interceptor asked for a live [`TapContext`].
    #[must_use]
    pub fn wants_context(&self) -> bool {
        self.context
    }

    /// Asks for a live [`TapContext`] on every invocation.
    ///
    /// Without this (and without a tap asking for one) callbacks receive a
    /// detached context that drops writes.
    #[must_use]
    pub fn with_context(mut self) -> Self {
        self.context = true;
        self
    }

    /// Sets the `register` callback, which may rewrite a tap's options before
    /// it is stored.
    #[must_use]
    pub fn on_register<F>(mut self, f: F) -> Self
    where
        F: Fn(TapOptions) -> Result<TapOptions, BoxError> + Send + Sync + 'static,
    {
        self.register = Some(Arc::new(f));
        self
    }

    /// Sets the `call` callback.
    #[must_use]
    pub fn on_call<F>(mut self, f: F) -> Self
    where
        F: Fn(&TapContext, &A) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.call = Some(Arc::new(f));
        self
    }

    /// Sets the `tap` callback.
    #[must_use]
    pub fn on_tap<F>(mut self, f: F) -> Self
    where
        F: Fn(&TapContext, &TapInfo) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.tap = Some(Arc::new(f));
        self
    }

    /// Sets the `loop` callback.
    #[must_use]
    pub fn on_loop<F>(mut self, f: F) -> Self
    where
        F: Fn(&TapContext, &A) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.loop_pass = Some(Arc::new(f));
        self
    }

    /// Sets the `result` callback.
    #[must_use]
    pub fn on_result<F>(mut self, f: F) -> Self
    where
        F: Fn(&TapContext, &R) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.result = Some(Arc::new(f));
        self
    }

    /// Sets the `error` callback.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&TapContext, &HookError) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(f));
        self
    }

    /// Sets the `done` callback.
    #[must_use]
    pub fn on_done<F>(mut self, f: F) -> Self
    where
        F: Fn(&TapContext) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.done = Some(Arc::new(f));
        self
    }

    pub(crate) fn registrar(&self) -> Option<Named<RegisterFn>> {
        self.register.as_ref().map(|f| Named::new(&self.name, f))
    }
}

impl<A, R> Clone for Interceptor<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            context: self.context,
            register: self.register.clone(),
            call: self.call.clone(),
            tap: self.tap.clone(),
            loop_pass: self.loop_pass.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            done: self.done.clone(),
        }
    }
}

impl<A, R> fmt::Debug for Interceptor<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("register", &self.register.is_some())
            .field("call", &self.call.is_some())
            .field("tap", &self.tap.is_some())
            .field("loop", &self.loop_pass.is_some())
            .field("result", &self.result.is_some())
            .field("error", &self.error.is_some())
            .field("done", &self.done.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Named / Lanes
// ─────────────────────────────────────────────────────────────────────────────

/// A callback tagged with the interceptor that defined it.
pub(crate) struct Named<F> {
    pub(crate) interceptor: Arc<str>,
    pub(crate) callback: F,
}

impl<F: Clone> Named<F> {
    fn new(interceptor: &Arc<str>, callback: &F) -> Self {
        Self {
            interceptor: Arc::clone(interceptor),
            callback: callback.clone(),
        }
    }
}

impl<F: Clone> Clone for Named<F> {
    fn clone(&self) -> Self {
        Self::new(&self.interceptor, &self.callback)
    }
}

/// The interceptor callbacks of one hook, split per lifecycle point.
///
/// Built once per execution plan, so dispatch only ever walks callbacks that
/// exist.
pub(crate) struct Lanes<A, R> {
    pub(crate) call: Arc<[Named<CallFn<A>>]>,
    pub(crate) tap: Arc<[Named<TapFn>]>,
    pub(crate) loop_pass: Arc<[Named<CallFn<A>>]>,
    pub(crate) result: Arc<[Named<ResultFn<R>>]>,
    pub(crate) error: Arc<[Named<ErrorFn>]>,
    pub(crate) done: Arc<[Named<DoneFn>]>,
}

impl<A, R> Lanes<A, R> {
    pub(crate) fn is_empty(&self) -> bool {
        self.call.is_empty()
            && self.tap.is_empty()
            && self.loop_pass.is_empty()
            && self.result.is_empty()
            && self.error.is_empty()
            && self.done.is_empty()
    }

    pub(crate) fn for_each_call(&self, ctx: &TapContext, args: &A) -> Result<(), HookError> {
        for named in self.call.iter() {
            (named.callback)(ctx, args).map_err(|source| {
                HookError::interceptor(&named.interceptor, InterceptStage::Call, source)
            })?;
        }
        Ok(())
    }

    pub(crate) fn for_each_loop(&self, ctx: &TapContext, args: &A) -> Result<(), HookError> {
        for named in self.loop_pass.iter() {
            (named.callback)(ctx, args).map_err(|source| {
                HookError::interceptor(&named.interceptor, InterceptStage::Loop, source)
            })?;
        }
        Ok(())
    }

    pub(crate) fn for_each_result(&self, ctx: &TapContext, result: &R) -> Result<(), HookError> {
        for named in self.result.iter() {
            (named.callback)(ctx, result).map_err(|source| {
                HookError::interceptor(&named.interceptor, InterceptStage::Result, source)
            })?;
        }
        Ok(())
    }

    pub(crate) fn for_each_error(&self, ctx: &TapContext, error: &HookError) {
        for named in self.error.iter() {
            (named.callback)(ctx, error);
        }
    }

    pub(crate) fn for_each_done(&self, ctx: &TapContext) -> Result<(), HookError> {
        for named in self.done.iter() {
            (named.callback)(ctx).map_err(|source| {
                HookError::interceptor(&named.interceptor, InterceptStage::Done, source)
            })?;
        }
        Ok(())
    }
}

/// Runs the `tap` callbacks of a lane before `tap` is invoked.
pub(crate) fn for_each_tap(
    lane: &[Named<TapFn>],
    ctx: &TapContext,
    tap: &TapInfo,
) -> Result<(), HookError> {
    for named in lane {
        (named.callback)(ctx, tap).map_err(|source| {
            HookError::interceptor(&named.interceptor, InterceptStage::Tap, source)
        })?;
    }
    Ok(())
}

/// Threads `options` through every `register` callback in order.
pub(crate) fn apply_register(
    registrars: &[Named<RegisterFn>],
    mut options: TapOptions,
) -> Result<TapOptions, HookError> {
    for named in registrars {
        options = (named.callback)(options).map_err(|source| {
            HookError::interceptor(&named.interceptor, InterceptStage::Register, source)
        })?;
    }
    Ok(options)
}

// ─────────────────────────────────────────────────────────────────────────────
// InterceptorChain
// ─────────────────────────────────────────────────────────────────────────────

/// The interceptors attached to one hook, in attachment order.
pub(crate) struct InterceptorChain<A, R> {
    interceptors: Vec<Interceptor<A, R>>,
}

impl<A, R> Default for InterceptorChain<A, R> {
    fn default() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }
}

impl<A, R> InterceptorChain<A, R> {
    pub(crate) fn attach(&mut self, interceptor: Interceptor<A, R>) {
        self.interceptors.push(interceptor);
    }

    pub(crate) fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub(crate) fn wants_context(&self) -> bool {
        self.interceptors.iter().any(Interceptor::wants_context)
    }

    pub(crate) fn registrars(&self) -> Vec<Named<RegisterFn>> {
        self.interceptors
            .iter()
            .filter_map(Interceptor::registrar)
            .collect()
    }

    pub(crate) fn lanes(&self) -> Lanes<A, R> {
        fn lane<A, R, F: Clone>(
            interceptors: &[Interceptor<A, R>],
            pick: impl Fn(&Interceptor<A, R>) -> Option<&F>,
        ) -> Arc<[Named<F>]> {
            interceptors
                .iter()
                .filter_map(|interceptor| {
                    pick(interceptor).map(|callback| Named::new(&interceptor.name, callback))
                })
                .collect()
        }

        let all = self.interceptors.as_slice();
        Lanes {
            call: lane(all, |i| i.call.as_ref()),
            tap: lane(all, |i| i.tap.as_ref()),
            loop_pass: lane(all, |i| i.loop_pass.as_ref()),
            result: lane(all, |i| i.result.as_ref()),
            error: lane(all, |i| i.error.as_ref()),
            done: lane(all, |i| i.done.as_ref()),
        }
    }
}
