//! Core infrastructure for applications built on tapestry hooks.
//!
//! - [`TracingSetup`] - Installs the global `tracing` subscriber
//! - [`TracingInterceptor`] - Reports hook activity as `tracing` events
//! - [`ProfilingInterceptor`] - Measures time spent per tap and per hook
//! - [`Clock`] - Mockable time source used by the profiler
//!
//! # Feature Flags
//!
//! - `test-utils` - Enables [`MockClock`] for deterministic timing tests
//!
//! # Example
//!
//! ```
//! use tapestry_core_plugins::{ProfilingInterceptor, TapTimings, TracingInterceptor, TracingSetup};
//! use tapestry_hooks::Hook;
//!
//! TracingSetup::new().init();
//!
//! let timings = TapTimings::new();
//! let done: Hook<(u32,)> = Hook::async_series().named("done");
//! TracingInterceptor::new().attach(&done)?;
//! ProfilingInterceptor::new(&timings).attach(&done)?;
//! done.tap("Stats", |_| Ok(None))?;
//! done.call((0,))?;
//!
//! assert_eq!(timings.hook("done").map(|h| h.invocations), Some(1));
//! # Ok::<(), tapestry_hooks::HookError>(())
//! ```

mod clock;
mod profiling;
mod tracing_interceptor;
mod tracing_setup;

pub use clock::{Clock, ClockProvider};
pub use profiling::{HookTiming, ProfileReport, ProfilingInterceptor, TapTiming, TapTimings};
pub use tracing_interceptor::TracingInterceptor;
pub use tracing_setup::{TracingConfig, TracingFormat, TracingSetup};

// Re-export test utilities
#[cfg(any(test, feature = "test-utils"))]
pub use clock::MockClock;
