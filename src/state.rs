//! Typed state aggregates and the partial updates merged over them.

/// A caller-defined state aggregate with shallow patch merging.
///
/// `Patch` is the partial form of the aggregate: the same record with every
/// field optional. `merge` implements override-if-present semantics — fields
/// carried by the patch replace the current values, fields the patch leaves
/// out are retained unchanged. The merge must build a fresh aggregate; the
/// store never mutates a state value in place.
///
/// # Example
///
/// ```ignore
/// struct Prefs { count: u32, theme: String }
///
/// #[derive(Default)]
/// struct PrefsPatch { count: Option<u32>, theme: Option<String> }
///
/// impl State for Prefs {
///     type Patch = PrefsPatch;
///     fn merge(&self, patch: PrefsPatch) -> Self {
///         Prefs {
///             count: patch.count.unwrap_or(self.count),
///             theme: patch.theme.unwrap_or_else(|| self.theme.clone()),
///         }
///     }
/// }
/// ```
pub trait State: Sized + Send + Sync + 'static {
    /// The partial form of this aggregate.
    type Patch: Send + 'static;

    /// Produce a new aggregate by merging `patch` over `self`.
    fn merge(&self, patch: Self::Patch) -> Self;
}

/// One state update, alive for a single setter invocation.
///
/// Either a ready patch, or a function from the previous full state to a
/// patch. The function form must be pure: it runs before the merge is
/// committed and must not call back into the store.
pub enum Update<S: State> {
    Patch(S::Patch),
    With(Box<dyn FnOnce(&S) -> S::Patch + Send>),
}

impl<S: State> Update<S> {
    /// Build a functional update.
    pub fn with<F>(f: F) -> Self
    where
        F: FnOnce(&S) -> S::Patch + Send + 'static,
    {
        Update::With(Box::new(f))
    }

    /// Resolve against the previous state, yielding the patch to merge.
    pub fn resolve(self, current: &S) -> S::Patch {
        match self {
            Update::Patch(patch) => patch,
            Update::With(f) => f(current),
        }
    }
}
