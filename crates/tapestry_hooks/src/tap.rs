//! Tap descriptions, calling conventions and registration handles.
//!
//! A tap is one callback registered against a hook. Its metadata lives in
//! [`TapOptions`] (what the registrant asked for) and [`TapInfo`] (what the
//! hook actually stored, after `register` interceptors had their say).

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use std::sync::{Arc, Weak};

use futures::channel::oneshot;
use serde_json::{Map, Value};

use crate::context::TapContext;
use crate::error::BoxError;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a tap hands back: `Some` is a defined value, `None` is "nothing".
///
/// Bail hooks stop on the first `Some`, waterfall hooks thread it into the
/// next tap, loop hooks restart their pass on it. Plain hooks ignore it.
pub type TapResult<R> = Result<Option<R>, BoxError>;

// ─────────────────────────────────────────────────────────────────────────────
// TapId / TapKind
// ─────────────────────────────────────────────────────────────────────────────

/// Identifier of a registered tap, unique within its hook.
///
/// Ids grow monotonically, so they also record registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TapId(pub(crate) u64);

impl TapId {
    /// Returns the raw id value.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tap_{}", self.0)
    }
}

/// Calling convention of a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapKind {
    /// Returns its result directly.
    Sync,
    /// Reports its result through a [`Continuation`].
    Callback,
    /// Returns a future that resolves to its result.
    Promise,
}

impl TapKind {
    /// Returns `true` for [`TapKind::Sync`].
    #[must_use]
    pub fn is_sync(self) -> bool {
        matches!(self, TapKind::Sync)
    }
}

impl fmt::Display for TapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            TapKind::Sync => "sync",
            TapKind::Callback => "callback-style",
            TapKind::Promise => "promise-style",
        };
        f.write_str(kind)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TapOptions
// ─────────────────────────────────────────────────────────────────────────────

/// Registration options for a tap.
///
/// Anything that converts into a `String` converts into `TapOptions` with
/// default ordering, so the common case stays short:
///
/// ```
/// # use tapestry_hooks::TapOptions;
/// let simple: TapOptions = "MinifyPlugin".into();
/// let ordered = TapOptions::new("BannerPlugin").before("MinifyPlugin").stage(-10);
/// assert_eq!(simple.stage, 0);
/// assert_eq!(ordered.before, vec!["MinifyPlugin".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TapOptions {
    /// Name of the tap. Required, not unique.
    pub name: String,
    /// Names of taps this tap must run before.
    pub before: Vec<String>,
    /// Ordering stage; lower stages run earlier.
    pub stage: i32,
    /// Free-form metadata, typically written by `register` interceptors.
    pub meta: Map<String, Value>,
}

impl TapOptions {
    /// Creates options with the given name and default ordering.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Requires this tap to run before every tap named `name`.
    #[must_use]
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.before.push(name.into());
        self
    }

    /// Sets the ordering stage.
    #[must_use]
    pub fn stage(mut self, stage: i32) -> Self {
        self.stage = stage;
        self
    }

    /// Stores a metadata entry.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for TapOptions {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TapOptions {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TapInfo
// ─────────────────────────────────────────────────────────────────────────────

/// A registered tap as stored by its hook.
#[derive(Debug, Clone, PartialEq)]
pub struct TapInfo {
    pub(crate) id: TapId,
    pub(crate) kind: TapKind,
    pub(crate) context: bool,
    pub(crate) options: TapOptions,
}

impl TapInfo {
    /// Returns the tap's id.
    #[must_use]
    pub fn id(&self) -> TapId {
        self.id
    }

    /// Returns the tap's calling convention.
    #[must_use]
    pub fn kind(&self) -> TapKind {
        self.kind
    }

    /// Returns whether the tap receives the shared [`TapContext`].
    #[must_use]
    pub fn wants_context(&self) -> bool {
        self.context
    }

    /// Returns the tap's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.options.name
    }

    /// Returns the tap's ordering stage.
    #[must_use]
    pub fn stage(&self) -> i32 {
        self.options.stage
    }

    /// Returns the names this tap must run before.
    #[must_use]
    pub fn before(&self) -> &[String] {
        &self.options.before
    }

    /// Returns the tap's metadata.
    #[must_use]
    pub fn meta(&self) -> &Map<String, Value> {
        &self.options.meta
    }

    /// Returns the full options the tap was stored with.
    #[must_use]
    pub fn options(&self) -> &TapOptions {
        &self.options
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TapCallback
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) type SyncTapFn<A, R> = Arc<dyn Fn(&TapContext, &A) -> TapResult<R> + Send + Sync>;
pub(crate) type CallbackTapFn<A, R> = Arc<dyn Fn(TapContext, A, Continuation<R>) + Send + Sync>;
pub(crate) type PromiseTapFn<A, R> =
    Arc<dyn Fn(TapContext, A) -> BoxFuture<'static, TapResult<R>> + Send + Sync>;

/// Type-erased tap callback, tagged by calling convention once at registration.
pub(crate) enum TapCallback<A, R> {
    Sync(SyncTapFn<A, R>),
    Callback(CallbackTapFn<A, R>),
    Promise(PromiseTapFn<A, R>),
}

impl<A, R> TapCallback<A, R> {
    pub(crate) fn kind(&self) -> TapKind {
        match self {
            TapCallback::Sync(_) => TapKind::Sync,
            TapCallback::Callback(_) => TapKind::Callback,
            TapCallback::Promise(_) => TapKind::Promise,
        }
    }
}

impl<A, R> Clone for TapCallback<A, R> {
    fn clone(&self) -> Self {
        match self {
            TapCallback::Sync(f) => TapCallback::Sync(Arc::clone(f)),
            TapCallback::Callback(f) => TapCallback::Callback(Arc::clone(f)),
            TapCallback::Promise(f) => TapCallback::Promise(Arc::clone(f)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Continuation
// ─────────────────────────────────────────────────────────────────────────────

/// One-shot completion handle handed to callback-style taps.
///
/// Exactly one of the completing methods should be called. A continuation
/// that is dropped unused fails the invocation with
/// [`HookError::ContinuationDropped`](crate::HookError::ContinuationDropped).
///
/// ```ignore
/// hook.tap_callback("fetch", |(url,), done| {
///     tokio::spawn(async move {
///         match download(&url).await {
///             Ok(bytes) => done.resolve(Some(bytes)),
///             Err(err) => done.fail(err),
///         }
///     });
/// })?;
/// ```
#[must_use = "a continuation must be completed or the invocation fails"]
pub struct Continuation<R> {
    sender: oneshot::Sender<TapResult<R>>,
}

impl<R> Continuation<R> {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<TapResult<R>>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    /// Completes the tap with an optional value.
    pub fn resolve(self, value: Option<R>) {
        self.complete(Ok(value));
    }

    /// Completes the tap without a value.
    pub fn done(self) {
        self.complete(Ok(None));
    }

    /// Fails the tap.
    pub fn fail(self, error: impl Into<BoxError>) {
        self.complete(Err(error.into()));
    }

    /// Completes the tap with a ready-made result.
    pub fn complete(self, result: TapResult<R>) {
        // The receiver is gone when a bail hook already settled; the outcome
        // is discarded in that case.
        let _ = self.sender.send(result);
    }
}

impl<R> fmt::Debug for Continuation<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("canceled", &self.sender.is_canceled())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TapHandle
// ─────────────────────────────────────────────────────────────────────────────

/// Anything that can drop one of its taps by id.
pub(crate) trait TapOwner: Send + Sync {
    fn remove_tap(&self, id: TapId) -> bool;
}

/// Handle returned by every registration method.
///
/// Holds a weak reference to the hook, so keeping a handle around never keeps
/// a hook alive.
#[derive(Clone)]
pub struct TapHandle {
    id: TapId,
    name: String,
    owner: Weak<dyn TapOwner>,
}

impl TapHandle {
    pub(crate) fn new(id: TapId, name: impl Into<String>, owner: Weak<dyn TapOwner>) -> Self {
        Self {
            id,
            name: name.into(),
            owner,
        }
    }

    /// Returns the id of the registered tap.
    #[must_use]
    pub fn id(&self) -> TapId {
        self.id
    }

    /// Returns the name the tap was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Removes the tap from its hook.
    ///
    /// Returns `false` if the tap was already removed or the hook is gone.
    pub fn unregister(&self) -> bool {
        self.owner
            .upgrade()
            .is_some_and(|owner| owner.remove_tap(self.id))
    }
}

impl fmt::Debug for TapHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tap_options_builder() {
        let options = TapOptions::new("banner")
            .before("minify")
            .before("hash")
            .stage(-3)
            .meta("origin", "config");

        assert_eq!(options.name, "banner");
        assert_eq!(options.before, vec!["minify", "hash"]);
        assert_eq!(options.stage, -3);
        assert_eq!(options.meta.get("origin"), Some(&Value::from("config")));
    }

    #[test]
    fn tap_options_from_name() {
        let options = TapOptions::from(String::from("emit"));
        assert_eq!(options, TapOptions::new("emit"));
    }

    #[test]
    fn tap_id_display() {
        assert_eq!(format!("{}", TapId(7)), "tap_7");
    }

    #[test]
    fn tap_kind_display() {
        assert_eq!(TapKind::Sync.to_string(), "sync");
        assert_eq!(TapKind::Callback.to_string(), "callback-style");
        assert!(!TapKind::Promise.is_sync());
    }

    #[test]
    fn continuation_delivers_value() {
        let (done, mut receiver) = Continuation::<u32>::channel();
        done.resolve(Some(3));
        let delivered = receiver.try_recv().expect("sender completed");
        assert_eq!(delivered.expect("sent").expect("ok"), Some(3));
    }

    #[test]
    fn dropped_continuation_cancels_receiver() {
        let (done, mut receiver) = Continuation::<u32>::channel();
        drop(done);
        assert!(receiver.try_recv().is_err());
    }
}
