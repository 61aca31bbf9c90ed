//! Error types for hook registration and dispatch.
//!
//! Three kinds of errors are wiring mistakes made by the program itself and
//! are reported at the point of misuse: [`HookError::InvalidTap`],
//! [`HookError::OrderingCycle`] and [`HookError::SyncCallOnAsyncHook`].
//!
//! Everything a tap produces is carried verbatim in [`HookError::Tap`], so the
//! caller can always get back to the original error through
//! [`source`](core::error::Error::source).

use core::fmt;

use crate::tap::TapKind;

/// Boxed error produced by tap and interceptor callbacks.
pub type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// The interceptor callback that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptStage {
    /// `register`, run when a tap is added or an interceptor is attached.
    Register,
    /// `call`, run once at the start of every invocation.
    Call,
    /// `tap`, run before each tap is invoked.
    Tap,
    /// `loop`, run at the start of every pass of a loop hook.
    Loop,
    /// `result`, run when the invocation produced a value.
    Result,
    /// `done`, run when the invocation completed successfully.
    Done,
}

impl fmt::Display for InterceptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            InterceptStage::Register => "register",
            InterceptStage::Call => "call",
            InterceptStage::Tap => "tap",
            InterceptStage::Loop => "loop",
            InterceptStage::Result => "result",
            InterceptStage::Done => "done",
        };
        f.write_str(stage)
    }
}

/// Errors that can occur while registering taps on or invoking a hook.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// A tap registration was malformed or not allowed on this hook.
    #[error("invalid tap on hook '{hook}': {reason}")]
    InvalidTap {
        /// The hook the tap was registered on.
        hook: String,
        /// Why the registration was rejected.
        reason: String,
    },

    /// The `before` constraints of the registered taps form a cycle.
    #[error("ordering cycle on hook '{hook}' between taps {taps:?}")]
    OrderingCycle {
        /// The hook whose taps could not be ordered.
        hook: String,
        /// Names of the taps caught in the cycle, in registration order.
        taps: Vec<String>,
    },

    /// The synchronous entry point was used while a non-sync tap is registered.
    #[error("hook '{hook}' cannot be called synchronously: tap '{tap}' is {kind}")]
    SyncCallOnAsyncHook {
        /// The hook that was called.
        hook: String,
        /// The first non-sync tap in call order.
        tap: String,
        /// The calling convention of that tap.
        kind: TapKind,
    },

    /// A tap failed.
    #[error("tap '{tap}' failed: {source}")]
    Tap {
        /// Name of the failing tap.
        tap: String,
        /// The error the tap produced.
        source: BoxError,
    },

    /// An interceptor callback failed.
    #[error("interceptor '{interceptor}' failed in {stage}: {source}")]
    Interceptor {
        /// Name of the failing interceptor.
        interceptor: String,
        /// Which callback failed.
        stage: InterceptStage,
        /// The error the interceptor produced.
        source: BoxError,
    },

    /// A callback-style tap dropped its continuation without completing it.
    #[error("tap '{tap}' dropped its continuation without completing")]
    ContinuationDropped {
        /// Name of the tap.
        tap: String,
    },

    /// A loop hook ran more passes than its configured limit.
    #[error("loop hook '{hook}' exceeded {max} passes")]
    LoopLimitExceeded {
        /// The loop hook.
        hook: String,
        /// The configured pass limit.
        max: usize,
    },

    /// A callback-style invocation needed a tokio runtime and none was running.
    #[error("hook '{hook}' has asynchronous taps but no tokio runtime is available")]
    NoRuntime {
        /// The hook that was called.
        hook: String,
    },
}

impl HookError {
    pub(crate) fn tap(tap: &str, source: BoxError) -> Self {
        HookError::Tap {
            tap: tap.to_owned(),
            source,
        }
    }

    pub(crate) fn interceptor(interceptor: &str, stage: InterceptStage, source: BoxError) -> Self {
        HookError::Interceptor {
            interceptor: interceptor.to_owned(),
            stage,
            source,
        }
    }

    /// Returns `true` for failures raised by tap code, as opposed to wiring
    /// mistakes or interceptor failures.
    #[must_use]
    pub fn is_tap_failure(&self) -> bool {
        matches!(
            self,
            HookError::Tap { .. }
                | HookError::ContinuationDropped { .. }
                | HookError::LoopLimitExceeded { .. }
        )
    }

    /// Returns the name of the tap responsible for this error, if any.
    #[must_use]
    pub fn tap_name(&self) -> Option<&str> {
        match self {
            HookError::Tap { tap, .. }
            | HookError::ContinuationDropped { tap }
            | HookError::SyncCallOnAsyncHook { tap, .. } => Some(tap),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_error_display() {
        let err = HookError::OrderingCycle {
            hook: "compile".into(),
            taps: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            format!("{err}"),
            r#"ordering cycle on hook 'compile' between taps ["a", "b"]"#
        );

        let err = HookError::SyncCallOnAsyncHook {
            hook: "emit".into(),
            tap: "upload".into(),
            kind: TapKind::Promise,
        };
        assert_eq!(
            format!("{err}"),
            "hook 'emit' cannot be called synchronously: tap 'upload' is promise-style"
        );

        let err = HookError::interceptor("audit", InterceptStage::Tap, "denied".into());
        assert_eq!(format!("{err}"), "interceptor 'audit' failed in tap: denied");
    }

    #[test]
    fn tap_error_keeps_source() {
        use core::error::Error;

        let err = HookError::tap("minify", "syntax error".into());
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("syntax error"));
        assert_eq!(err.tap_name(), Some("minify"));
        assert!(err.is_tap_failure());
    }

    #[test]
    fn interceptor_errors_are_not_tap_failures() {
        let err = HookError::interceptor("audit", InterceptStage::Call, "nope".into());
        assert!(!err.is_tap_failure());
        assert_eq!(err.tap_name(), None);
    }
}
