use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::error::StoreError;
use crate::middleware::Middleware;
use crate::state::{State, Update};

/// The setter primitive as a shareable closure.
///
/// This is what middleware wraps and what initializer-created action
/// closures capture. Routing always goes through the composed chain, so an
/// action built during initialization still picks up middleware installed
/// afterwards.
pub type SetFn<S> = Arc<dyn Fn(Update<S>) -> Result<(), StoreError> + Send + Sync>;

/// The getter primitive as a shareable closure.
///
/// Always reads live state. Returns `None` until the initializer's result
/// has been assigned (the use-before-init guard), and after the store has
/// been dropped.
pub type GetFn<S> = Arc<dyn Fn() -> Option<Arc<S>> + Send + Sync>;

/// Unique handle for a subscription, returned by [`Store::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

type Listener = Arc<dyn Fn() + Send + Sync>;

struct SubscriberEntry {
    id: SubscriptionId,
    listener: Listener,
}

pub(crate) struct Inner<S: State> {
    /// Current state. `None` only during construction, before the
    /// initializer's result is assigned.
    state: RwLock<Option<Arc<S>>>,
    /// Registered listeners, in registration order.
    subscribers: RwLock<Vec<SubscriberEntry>>,
    /// Monotonic counter for subscription IDs.
    next_id: AtomicU64,
    /// The composed setter every state-changing call routes through. Holds
    /// the raw core setter until middleware composition completes.
    dispatch: RwLock<Option<SetFn<S>>>,
}

impl<S: State> Inner<S> {
    pub(crate) fn current(&self) -> Option<Arc<S>> {
        self.state.read().expect("state lock poisoned").clone()
    }

    /// Invoke every listener in registration order. Listeners are cloned out
    /// of the lock first so they can freely re-enter the store.
    fn notify(&self) {
        let listeners: Vec<Listener> = {
            let subs = self.subscribers.read().expect("subscriber lock poisoned");
            subs.iter().map(|e| Arc::clone(&e.listener)).collect()
        };
        for listener in listeners {
            listener();
        }
    }
}

/// A single observable holder of one state aggregate plus its subscribers.
///
/// The store owns one immutable state value behind an `Arc`. Every commit
/// resolves the update against the previous state, shallow-merges it, swaps
/// in a **new** `Arc` (even when the merged value is identical — there is no
/// deep-equality short-circuit), and synchronously notifies every subscriber
/// exactly once, in registration order.
///
/// Cloning the store is cheap and yields another handle to the same state.
///
/// # Example
///
/// ```ignore
/// let store = Store::new(|_set, _get| Prefs { count: 0, theme: "dark".into() })?;
///
/// store.subscribe(|| println!("changed"));
/// store.set(PrefsPatch { count: Some(1), ..Default::default() })?;
/// assert_eq!(store.get().count, 1);
/// ```
pub struct Store<S: State> {
    inner: Arc<Inner<S>>,
}

impl<S: State> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: State> Store<S> {
    /// Create a store with no middleware.
    ///
    /// The initializer is invoked exactly once, synchronously, with the
    /// set/get primitives bound to the store under construction. Calling the
    /// bound `set` from inside the initializer body fails with
    /// [`StoreError::Uninitialized`] (state is not yet assigned); closures
    /// the initializer stores in the state may call it freely once
    /// construction has returned.
    pub fn new<F>(initializer: F) -> Result<Self, StoreError>
    where
        F: FnOnce(SetFn<S>, GetFn<S>) -> S,
    {
        Self::with_middleware(initializer, Vec::new())
    }

    /// Create a store wrapped by an ordered middleware list.
    ///
    /// The first middleware in the list becomes the outermost layer: a
    /// commit enters it first, and the raw core setter runs innermost.
    /// Middleware setup errors abort construction.
    pub fn with_middleware<F>(
        initializer: F,
        middleware: Vec<Box<dyn Middleware<S>>>,
    ) -> Result<Self, StoreError>
    where
        F: FnOnce(SetFn<S>, GetFn<S>) -> S,
    {
        let inner = Arc::new(Inner {
            state: RwLock::new(None),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            dispatch: RwLock::new(None),
        });

        let get = Self::get_fn(&inner);
        let base = Self::base_set_fn(&inner);

        // Route through the raw setter until composition completes, so
        // actions created by the initializer stay valid either way.
        *inner.dispatch.write().expect("dispatch lock poisoned") = Some(Arc::clone(&base));

        let initial = initializer(Self::dispatch_fn(&inner), Arc::clone(&get));
        *inner.state.write().expect("state lock poisoned") = Some(Arc::new(initial));

        // Wrap back-to-front: the last middleware ends up closest to the raw
        // setter, the first outermost. Setup work inside `wrap` (e.g.
        // rehydration) runs here, before the caller sees the store.
        let mut composed = base;
        for layer in middleware.into_iter().rev() {
            composed = layer.wrap(composed, Arc::clone(&get))?;
        }
        *inner.dispatch.write().expect("dispatch lock poisoned") = Some(composed);

        Ok(Self { inner })
    }

    // ====================================================================
    // State — read
    // ====================================================================

    /// Current state reference. Cheap `Arc` clone, never blocks on IO.
    pub fn get(&self) -> Arc<S> {
        self.inner
            .current()
            .expect("state is assigned before construction returns")
    }

    /// Apply a selector to the current state.
    ///
    /// This is a plain projection: the subscription bus still fires on every
    /// commit regardless of what a selector looks at. Use [`Store::watch`]
    /// for change-driven delivery of a selected value.
    pub fn select<R>(&self, selector: impl Fn(&S) -> R) -> R {
        selector(&self.get())
    }

    // ====================================================================
    // State — write
    // ====================================================================

    /// Merge a partial update into the current state through the middleware
    /// chain, then notify subscribers.
    pub fn set(&self, patch: S::Patch) -> Result<(), StoreError> {
        self.apply(Update::Patch(patch))
    }

    /// Functional update form: `f` receives the previous state and returns
    /// the patch to merge.
    pub fn update<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&S) -> S::Patch + Send + 'static,
    {
        self.apply(Update::with(f))
    }

    /// Route a raw update through the composed setter.
    pub fn apply(&self, update: Update<S>) -> Result<(), StoreError> {
        let set = {
            let guard = self.inner.dispatch.read().expect("dispatch lock poisoned");
            guard.clone().ok_or(StoreError::Uninitialized)?
        };
        set(update)
    }

    // ====================================================================
    // Subscriptions
    // ====================================================================

    /// Register a listener invoked synchronously after every commit.
    ///
    /// Listeners fire in registration order, exactly once per commit, on the
    /// committing thread. Together with [`Store::get`] this is the
    /// (subscribe, snapshot) pair a reactive binding layer consumes.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subs = self
            .inner
            .subscribers
            .write()
            .expect("subscriber lock poisoned");
        subs.push(SubscriberEntry {
            id,
            listener: Arc::new(listener),
        });
        id
    }

    /// Remove a listener. Removing an id that is not registered is a no-op,
    /// so unsubscribing twice is safe.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self
            .inner
            .subscribers
            .write()
            .expect("subscriber lock poisoned");
        subs.retain(|e| e.id != id);
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .expect("subscriber lock poisoned")
            .len()
    }

    // ====================================================================
    // Primitive construction
    // ====================================================================

    pub(crate) fn weak_inner(&self) -> Weak<Inner<S>> {
        Arc::downgrade(&self.inner)
    }

    fn get_fn(inner: &Arc<Inner<S>>) -> GetFn<S> {
        let weak = Arc::downgrade(inner);
        Arc::new(move || weak.upgrade()?.current())
    }

    /// The raw core setter: resolve, merge, swap the reference, notify.
    fn base_set_fn(inner: &Arc<Inner<S>>) -> SetFn<S> {
        let weak = Arc::downgrade(inner);
        Arc::new(move |update: Update<S>| {
            let inner = weak.upgrade().ok_or(StoreError::Uninitialized)?;
            let current = inner.current().ok_or(StoreError::Uninitialized)?;
            // The merge is computed before the single assignment below, so a
            // panicking updater leaves the state untouched.
            let patch = update.resolve(&current);
            let next = Arc::new(current.merge(patch));
            *inner.state.write().expect("state lock poisoned") = Some(next);
            inner.notify();
            Ok(())
        })
    }

    /// A late-bound setter that forwards to whatever the dispatch slot holds.
    fn dispatch_fn(inner: &Arc<Inner<S>>) -> SetFn<S> {
        let weak = Arc::downgrade(inner);
        Arc::new(move |update: Update<S>| {
            let inner = weak.upgrade().ok_or(StoreError::Uninitialized)?;
            let set = {
                let guard = inner.dispatch.read().expect("dispatch lock poisoned");
                guard.clone().ok_or(StoreError::Uninitialized)?
            };
            set(update)
        })
    }
}
