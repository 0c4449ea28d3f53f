use std::sync::Arc;

use tracing::debug;

use crate::error::StoreError;
use crate::state::State;
use crate::store::{GetFn, SetFn};

/// A setter-wrapping layer composed at store creation.
///
/// Given middleware list `[m1, m2]`, the composed setter invokes `m1`'s
/// enhancement first; `m1` decides when to call the setter it was given
/// (`m2`'s enhancement), which in turn calls the raw core setter. Code
/// before the inner call therefore runs outer-to-inner and code after it
/// runs inner-to-outer. A layer that never calls `next` suppresses the
/// update.
///
/// `wrap` runs once, at store creation; closure state captured by the
/// returned setter lives as long as the store. Every layer receives a clone
/// of the same `get`, which always reads live state.
pub trait Middleware<S: State>: Send {
    /// Wrap `next`, returning the enhanced setter. An error here aborts
    /// store construction.
    fn wrap(self: Box<Self>, next: SetFn<S>, get: GetFn<S>) -> Result<SetFn<S>, StoreError>;
}

/// Middleware built from a plain `(next, get) -> enhanced` closure.
///
/// See [`from_fn`].
pub struct FromFn<F>(F);

/// Lift a closure into a [`Middleware`].
///
/// ```ignore
/// let audit = from_fn(|next: SetFn<Prefs>, _get| {
///     let enhanced: SetFn<Prefs> = Arc::new(move |update| {
///         // before-hook
///         let result = next(update);
///         // after-hook
///         result
///     });
///     Ok(enhanced)
/// });
/// let store = Store::with_middleware(init, vec![Box::new(audit)])?;
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F> {
    FromFn(f)
}

impl<S, F> Middleware<S> for FromFn<F>
where
    S: State,
    F: FnOnce(SetFn<S>, GetFn<S>) -> Result<SetFn<S>, StoreError> + Send,
{
    fn wrap(self: Box<Self>, next: SetFn<S>, get: GetFn<S>) -> Result<SetFn<S>, StoreError> {
        (self.0)(next, get)
    }
}

/// Observing middleware that logs every commit at debug level.
///
/// Purely pass-through: the update always reaches the wrapped setter.
pub struct TraceMiddleware {
    label: String,
}

impl TraceMiddleware {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl<S: State> Middleware<S> for TraceMiddleware {
    fn wrap(self: Box<Self>, next: SetFn<S>, _get: GetFn<S>) -> Result<SetFn<S>, StoreError> {
        let label = self.label;
        let enhanced: SetFn<S> = Arc::new(move |update| {
            debug!(store = %label, "commit begin");
            let result = next(update);
            match &result {
                Ok(()) => debug!(store = %label, "commit end"),
                Err(e) => debug!(store = %label, error = %e, "commit aborted"),
            }
            result
        });
        Ok(enhanced)
    }
}
