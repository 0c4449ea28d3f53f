//! Ripple — a minimal observable state container.
//!
//! One store owns one state aggregate. Updates are partial patches merged
//! over the previous value; every commit produces a fresh reference and
//! synchronously notifies every subscriber, in registration order.
//! Cross-cutting behavior (logging, validation, persistence) wraps the
//! setter as middleware composed at store creation.
//!
//! # Three Primitives
//!
//! - `get()` — read the current state, Arc zero-copy
//! - `set(patch)` / `update(f)` — merge a partial update through the
//!   middleware chain, then notify
//! - `subscribe(listener)` — observe every commit; `watch(selector, f)`
//!   layers value-diffing on top for consumers that only care about part
//!   of the state
//!
//! # Persistence
//!
//! The [`Persist`] middleware rehydrates a store from a key-value text
//! adapter at creation and writes a (possibly filtered) snapshot back after
//! each commit. Any [`StorageAdapter`] works; [`MemoryAdapter`] and the
//! redb-backed [`RedbStorage`] ship with the crate.
//!
//! # Example
//!
//! ```ignore
//! use ripple::{MemoryAdapter, Persist, Store};
//!
//! let adapter = Arc::new(MemoryAdapter::new());
//! let store = Store::with_middleware(
//!     |_set, _get| Prefs { count: 0, theme: "dark".into() },
//!     vec![Box::new(Persist::new("prefs", adapter))],
//! )?;
//!
//! store.subscribe(|| println!("state changed"));
//! store.set(PrefsPatch { count: Some(1), ..Default::default() })?;
//! assert_eq!(store.get().count, 1);
//! ```

pub mod adapter;
pub mod error;
pub mod middleware;
pub mod persist;
pub mod state;
pub mod store;
mod watch;

// Re-export primary types at crate root.
pub use adapter::{MemoryAdapter, RedbStorage, StorageAdapter};
pub use error::{AdapterError, StoreError};
pub use middleware::{FromFn, Middleware, TraceMiddleware, from_fn};
pub use persist::Persist;
pub use state::{State, Update};
pub use store::{GetFn, SetFn, Store, SubscriptionId};
