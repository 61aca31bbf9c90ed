//! Mockable time source for profiling.
//!
//! [`Clock`] wraps a [`ClockProvider`]. Production code uses the system
//! clock; tests swap in [`MockClock`] (feature `test-utils`) so measured tap
//! durations are exact.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tapestry_core_plugins::Clock;
//!
//! let clock = Clock::system();
//! let start = clock.now();
//! assert!(clock.elapsed_since(start) < Duration::from_secs(60));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

// ─────────────────────────────────────────────────────────────────────────────
// ClockProvider
// ─────────────────────────────────────────────────────────────────────────────

/// A source of monotonic instants.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Instant;
/// use tapestry_core_plugins::{Clock, ClockProvider};
///
/// struct Frozen(Instant);
///
/// impl ClockProvider for Frozen {
///     fn now(&self) -> Instant {
///         self.0
///     }
/// }
///
/// let at = Instant::now();
/// let clock = Clock::with_provider(Arc::new(Frozen(at)));
/// assert_eq!(clock.now(), at);
/// ```
pub trait ClockProvider: Send + Sync + 'static {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
struct SystemClock;

impl ClockProvider for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Clock
// ─────────────────────────────────────────────────────────────────────────────

/// Shared handle to a [`ClockProvider`]. Cloning is cheap.
#[derive(Clone)]
pub struct Clock {
    provider: Arc<dyn ClockProvider>,
}

impl Clock {
    /// A clock backed by [`Instant::now`].
    #[must_use]
    pub fn system() -> Self {
        Self {
            provider: Arc::new(SystemClock),
        }
    }

    /// A clock backed by a custom provider.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn ClockProvider>) -> Self {
        Self { provider }
    }

    /// Returns the current instant.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.provider.now()
    }

    /// Returns the time elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock").finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MockClock
// ─────────────────────────────────────────────────────────────────────────────

/// A manually advanced clock for deterministic tests.
///
/// ```
/// # #[cfg(feature = "test-utils")]
/// # {
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
/// use tapestry_core_plugins::{Clock, MockClock};
///
/// let start = Instant::now();
/// let mock = Arc::new(MockClock::new(start));
/// let clock = Clock::with_provider(mock.clone());
///
/// mock.advance(Duration::from_millis(250));
/// assert_eq!(clock.elapsed_since(start), Duration::from_millis(250));
/// # }
/// ```
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct MockClock {
    current: parking_lot::RwLock<Instant>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockClock {
    /// Creates a mock clock frozen at `start`.
    #[must_use]
    pub fn new(start: Instant) -> Self {
        Self {
            current: parking_lot::RwLock::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.current.write() += by;
    }

    /// Jumps to an absolute instant.
    pub fn set(&self, to: Instant) {
        *self.current.write() = to;
    }

    /// Returns the instant the clock currently reads.
    #[must_use]
    pub fn current(&self) -> Instant {
        *self.current.read()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl ClockProvider for MockClock {
    fn now(&self) -> Instant {
        self.current()
    }
}
