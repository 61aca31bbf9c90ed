//! # Tapestry Internal Library
//!
//! Re-exports the core Tapestry crates for convenience.

/// Hook engine: taps, interceptors, dispatch and hook maps.
pub use tapestry_hooks;

/// Tracing setup, logging and profiling interceptors.
pub use tapestry_core_plugins;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use tapestry_core_plugins::{ProfilingInterceptor, TapTimings, TracingInterceptor, TracingSetup};
    pub use tapestry_hooks::prelude::*;
}
