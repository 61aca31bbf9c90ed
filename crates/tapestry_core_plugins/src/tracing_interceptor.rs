//! An interceptor that reports hook activity as `tracing` events.
//!
//! Every lifecycle callback becomes one event carrying the hook label as a
//! field. Calls, taps, loop passes, results and completions are emitted at
//! the configured level. Failures are always emitted at `WARN` or above.
//!
//! # Example
//!
//! ```
//! use tapestry_core_plugins::TracingInterceptor;
//! use tapestry_hooks::Hook;
//! use tracing::Level;
//!
//! let emit: Hook<(String,)> = Hook::sync().named("emit");
//! TracingInterceptor::new().with_level(Level::DEBUG).attach(&emit)?;
//! emit.tap("WriteAssets", |_| Ok(None))?;
//! emit.call(("dist".into(),))?;
//! # Ok::<(), tapestry_hooks::HookError>(())
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;
use tapestry_hooks::{Hook, HookArgs, HookError, HookOutput, Interceptor};
use tracing::Level;

/// Emits a `tracing` event at a level chosen at runtime.
macro_rules! event_at {
    ($level:expr, $($rest:tt)+) => {{
        let level = $level;
        if level == Level::ERROR {
            tracing::error!($($rest)+);
        } else if level == Level::WARN {
            tracing::warn!($($rest)+);
        } else if level == Level::INFO {
            tracing::info!($($rest)+);
        } else if level == Level::DEBUG {
            tracing::debug!($($rest)+);
        } else {
            tracing::trace!($($rest)+);
        }
    }};
}

/// Builder for a logging [`Interceptor`].
#[derive(Debug, Clone)]
pub struct TracingInterceptor {
    level: Level,
    tap_events: bool,
    registrations: bool,
}

impl Default for TracingInterceptor {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            tap_events: true,
            registrations: false,
        }
    }
}

impl TracingInterceptor {
    /// Logs at `DEBUG`, including one event per tap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level for non-failure events.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Enables or disables the per-tap event.
    #[must_use]
    pub fn with_tap_events(mut self, enabled: bool) -> Self {
        self.tap_events = enabled;
        self
    }

    /// Also logs every tap registration, including taps already present
    /// when the interceptor is attached.
    #[must_use]
    pub fn with_registrations(mut self, enabled: bool) -> Self {
        self.registrations = enabled;
        self
    }

    /// Attaches a logging interceptor to `hook`, labelled with the hook's
    /// name.
    ///
    /// # Errors
    ///
    /// Never fails in practice: the register callback passes options through
    /// unchanged. The `Result` mirrors [`Hook::intercept`].
    pub fn attach<A, R>(&self, hook: &Hook<A, R>) -> Result<(), HookError>
    where
        A: HookArgs + Debug,
        R: HookOutput + Debug,
    {
        let label = hook.label();
        hook.intercept(self.interceptor(label))
    }

    /// Builds the interceptor for a hook labelled `hook` in the output.
    #[must_use]
    pub fn interceptor<A, R>(&self, hook: impl Into<String>) -> Interceptor<A, R>
    where
        A: Debug + 'static,
        R: Debug + 'static,
    {
        let hook: Arc<str> = Arc::from(hook.into());
        let level = self.level;

        let mut interceptor = Interceptor::new("tracing")
            .on_call({
                let hook = Arc::clone(&hook);
                move |_, args: &A| {
                    event_at!(level, hook = %hook, args = ?args, "hook called");
                    Ok(())
                }
            })
            .on_loop({
                let hook = Arc::clone(&hook);
                move |_, args: &A| {
                    event_at!(level, hook = %hook, args = ?args, "loop pass");
                    Ok(())
                }
            })
            .on_result({
                let hook = Arc::clone(&hook);
                move |_, value: &R| {
                    event_at!(level, hook = %hook, result = ?value, "hook produced a result");
                    Ok(())
                }
            })
            .on_error({
                let hook = Arc::clone(&hook);
                move |_, err| {
                    let tap = err.tap_name().unwrap_or("-");
                    if level == Level::ERROR {
                        tracing::error!(hook = %hook, tap, error = %err, "hook failed");
                    } else {
                        tracing::warn!(hook = %hook, tap, error = %err, "hook failed");
                    }
                }
            })
            .on_done({
                let hook = Arc::clone(&hook);
                move |_| {
                    event_at!(level, hook = %hook, "hook done");
                    Ok(())
                }
            });

        if self.tap_events {
            let hook = Arc::clone(&hook);
            interceptor = interceptor.on_tap(move |_, info| {
                event_at!(
                    level,
                    hook = %hook,
                    tap = info.name(),
                    kind = %info.kind(),
                    stage = info.stage(),
                    "tap invoked"
                );
                Ok(())
            });
        }

        if self.registrations {
            interceptor = interceptor.on_register(move |options| {
                let meta = Value::Object(options.meta.clone());
                event_at!(
                    level,
                    hook = %hook,
                    tap = %options.name,
                    stage = options.stage,
                    before = ?options.before,
                    meta = %meta,
                    "tap registered"
                );
                Ok(options)
            });
        }

        interceptor
    }
}
