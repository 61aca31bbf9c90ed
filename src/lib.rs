//! Staged, interceptable hooks for building plugin-driven tools.
//!
//! A host object owns [`Hook`](tapestry_hooks::Hook)s, plugins tap them, and
//! the host calls them at well-defined points of its lifecycle. See
//! [`tapestry_hooks`] for the engine and [`tapestry_core_plugins`] for
//! tracing and profiling.
//!
//! ```
//! use tapestry::prelude::*;
//!
//! let seal: Hook<(Vec<String>,)> = Hook::sync().named("seal");
//! seal.tap("ChunkNames", |(chunks,)| {
//!     assert_eq!(chunks.len(), 2);
//!     Ok(None)
//! })?;
//! seal.call((vec!["main".into(), "vendor".into()],))?;
//! # Ok::<(), HookError>(())
//! ```

pub use tapestry_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use tapestry_internal::prelude::*;
}
