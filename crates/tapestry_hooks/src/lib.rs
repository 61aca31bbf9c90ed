//! Staged hook dispatch for Tapestry.
//!
//! `tapestry_hooks` lets independent plugins register ordered callbacks
//! ("taps") against extension points ("hooks"), and lets the owner of a hook
//! invoke every tap under one of several composition semantics, synchronously
//! or asynchronously. Interceptors observe registration and invocation
//! without touching tap code.
//!
//! # Core Concepts
//!
//! - [`Hook`] - an extension point with a fixed [`HookKind`]
//! - [`TapOptions`] - tap name plus `before`/`stage` ordering
//! - [`Interceptor`] - lifecycle observer attached to a hook
//! - [`TapContext`] - per-invocation shared state
//! - [`HookMap`] - hooks created lazily per key
//!
//! # Dispatch variants
//!
//! | Kind | Taps run | Result |
//! |------|----------|--------|
//! | `Sync` / `AsyncSeries` | in order | none |
//! | `SyncBail` / `AsyncSeriesBail` | in order, until a value | first value |
//! | `SyncWaterfall` / `AsyncSeriesWaterfall` | in order, threading values | final leading argument |
//! | `SyncLoop` / `AsyncSeriesLoop` | in passes, restarting on a value | none |
//! | `AsyncParallel` | all at once | none, or first failure |
//! | `AsyncParallelBail` | all at once | first value or failure to settle |
//!
//! # Example
//!
//! ```
//! use tapestry_hooks::{Hook, TapOptions};
//!
//! let transform: Hook<(u32,), u32> = Hook::sync_waterfall().named("transform");
//! transform.tap("double", |(x,)| Ok(Some(x * 2)))?;
//! transform.tap(TapOptions::new("increment").before("double"), |(x,)| Ok(Some(x + 1)))?;
//!
//! // increment runs first: (3 + 1) * 2
//! assert_eq!(transform.call((3,))?, Some(8));
//! # Ok::<(), tapestry_hooks::HookError>(())
//! ```
//!
//! # Invocation
//!
//! Every hook has three entry points. [`Hook::call`] runs on the caller's
//! stack and requires every tap to be sync. [`Hook::call_async`] returns a
//! future. [`Hook::call_with`] hands the outcome to a callback, inline when
//! possible and on the current tokio runtime otherwise.

mod args;
mod context;
mod dispatch;
mod error;
mod hook;
mod hook_map;
mod interceptor;
mod plan;
mod registry;
mod tap;

pub use args::{HookArgs, HookOutput, WaterfallArgs};
pub use context::TapContext;
pub use error::{BoxError, HookError, InterceptStage};
pub use hook::{Hook, HookKind};
pub use hook_map::{HookMap, HookMapInterceptor};
pub use interceptor::Interceptor;
pub use plan::PlanSummary;
pub use tap::{BoxFuture, Continuation, TapHandle, TapId, TapInfo, TapKind, TapOptions, TapResult};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        BoxError, BoxFuture, Continuation, Hook, HookError, HookKind, HookMap, HookMapInterceptor,
        Interceptor, TapContext, TapHandle, TapInfo, TapKind, TapOptions, TapResult,
    };
}
