//! Argument and result bounds for hooks.
//!
//! Hook arguments are plain tuples: a hook declared as `Hook<(String, u32)>`
//! hands every tap a `&(String, u32)`. Waterfall hooks additionally need to
//! swap out the leading element between taps, which [`WaterfallArgs`] provides
//! for tuples of up to sixteen elements.

use variadics_please::all_tuples;

/// Bound for hook argument tuples.
///
/// Any type that is `Clone + Send + Sync + 'static` automatically implements
/// `HookArgs`. Arguments are cloned once per asynchronous tap, since those
/// taps may hold on to them past the invoking call.
pub trait HookArgs: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> HookArgs for T {}

/// Bound for tap results.
///
/// Any type that is `Send + Sync + 'static` automatically implements
/// `HookOutput`.
pub trait HookOutput: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> HookOutput for T {}

/// Argument tuples whose first element can be threaded through a waterfall.
///
/// ```
/// use tapestry_hooks::WaterfallArgs;
///
/// let mut args = (3, "unchanged");
/// args.replace_leading(4);
/// assert_eq!(*args.leading(), 4);
/// assert_eq!(args.into_leading(), 4);
/// ```
pub trait WaterfallArgs<T>: Sized {
    /// Returns the leading argument.
    fn leading(&self) -> &T;

    /// Replaces the leading argument.
    fn replace_leading(&mut self, value: T);

    /// Consumes the tuple, returning the leading argument.
    fn into_leading(self) -> T;
}

macro_rules! impl_waterfall_args_for_tuple {
    ($($B:ident),*) => {
        impl<T, $($B),*> WaterfallArgs<T> for (T, $($B,)*) {
            fn leading(&self) -> &T {
                &self.0
            }

            fn replace_leading(&mut self, value: T) {
                self.0 = value;
            }

            fn into_leading(self) -> T {
                self.0
            }
        }
    };
}

// (T,) up to (T, B0, .., B14)
all_tuples!(impl_waterfall_args_for_tuple, 0, 15, B);

/// Waterfall threading, resolved once when the hook is built.
pub(crate) struct WaterfallOps<A, R> {
    pub(crate) replace: fn(&mut A, R),
    pub(crate) finish: fn(A) -> R,
}

impl<A, R> WaterfallOps<A, R>
where
    A: WaterfallArgs<R>,
{
    pub(crate) fn new() -> Self {
        Self {
            replace: <A as WaterfallArgs<R>>::replace_leading,
            finish: <A as WaterfallArgs<R>>::into_leading,
        }
    }
}

impl<A, R> Clone for WaterfallOps<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for WaterfallOps<A, R> {}
