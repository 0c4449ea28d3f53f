//! Persistence middleware: rehydrate a store from external text storage at
//! creation, and keep storage synchronized with every subsequent commit.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::adapter::StorageAdapter;
use crate::error::StoreError;
use crate::middleware::Middleware;
use crate::state::{State, Update};
use crate::store::{GetFn, SetFn};

/// Stored record shape:
///
/// ```text
/// { "_version": 0, "state": { ... full or partial state ... } }
/// ```
///
/// A record whose `_version` field is absent reads as version 0.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedRecord {
    #[serde(rename = "_version", default)]
    version: u32,
    state: serde_json::Value,
}

type PartializeFn<S> = Box<dyn Fn(&S) -> <S as State>::Patch + Send + Sync>;
type MigrateFn<S> = Box<dyn Fn(<S as State>::Patch, u32) -> <S as State>::Patch + Send + Sync>;

/// Persistence middleware.
///
/// At store creation, reads `adapter.get_item(name)` and merges the decoded
/// patch over the initializer's defaults before the caller sees the store.
/// After every commit, writes `{ "_version": version, "state": ... }` back
/// under the same key.
///
/// Write-back is best-effort: adapter and serialization failures are logged
/// and never affect the already-committed in-memory state. A missing or
/// malformed stored record falls back to the initializer's defaults;
/// construction never fails on bad storage.
///
/// # Example
///
/// ```ignore
/// let adapter = Arc::new(MemoryAdapter::new());
/// let store = Store::with_middleware(
///     |_set, _get| Prefs { count: 0, theme: "dark".into() },
///     vec![Box::new(
///         Persist::new("prefs", adapter).version(1),
///     )],
/// )?;
/// ```
pub struct Persist<S: State> {
    name: String,
    adapter: Arc<dyn StorageAdapter>,
    version: u32,
    partialize: Option<PartializeFn<S>>,
    migrate: Option<MigrateFn<S>>,
}

impl<S: State> Persist<S> {
    /// Persist the full state under the storage key `name`, version 0.
    pub fn new(name: impl Into<String>, adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            name: name.into(),
            adapter,
            version: 0,
            partialize: None,
            migrate: None,
        }
    }

    /// Stamp persisted records with a schema version.
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Persist only the fields selected by `f` instead of the full state.
    ///
    /// In-memory state is unaffected; unselected fields are simply omitted
    /// from the stored blob.
    pub fn partialize<F>(mut self, f: F) -> Self
    where
        F: Fn(&S) -> S::Patch + Send + Sync + 'static,
    {
        self.partialize = Some(Box::new(f));
        self
    }

    /// Upgrade a stored patch whose `_version` differs from the configured
    /// one, before it is merged at rehydration. Called with the decoded
    /// patch and the stored version.
    pub fn migrate<F>(mut self, f: F) -> Self
    where
        F: Fn(S::Patch, u32) -> S::Patch + Send + Sync + 'static,
    {
        self.migrate = Some(Box::new(f));
        self
    }
}

impl<S> Middleware<S> for Persist<S>
where
    S: State + Serialize,
    S::Patch: Serialize + DeserializeOwned,
{
    fn wrap(self: Box<Self>, next: SetFn<S>, get: GetFn<S>) -> Result<SetFn<S>, StoreError> {
        let Persist {
            name,
            adapter,
            version,
            partialize,
            migrate,
        } = *self;

        // Rehydrate before the caller sees the store. The commit goes
        // through `next`, so it merges over the initializer's defaults:
        // stored keys win, everything else keeps its default.
        match adapter.get_item(&name) {
            Ok(Some(text)) => match decode::<S>(&text) {
                Ok((patch, stored_version)) => {
                    let patch = match &migrate {
                        Some(f) if stored_version != version => f(patch, stored_version),
                        _ => patch,
                    };
                    next(Update::Patch(patch))?;
                }
                Err(reason) => {
                    error!(key = %name, %reason, "discarding malformed persisted state");
                }
            },
            Ok(None) => {}
            Err(e) => {
                error!(key = %name, error = %e, "failed to read persisted state");
            }
        }

        let enhanced: SetFn<S> = Arc::new(move |update| {
            next(update)?;
            // In-memory state is committed; everything below is best-effort.
            let Some(current) = get() else {
                return Ok(());
            };
            let text = match &partialize {
                Some(f) => encode(version, f(&current)),
                None => encode(version, &*current),
            };
            match text {
                Ok(text) => {
                    if let Err(e) = adapter.set_item(&name, &text) {
                        warn!(key = %name, error = %e, "persist write failed");
                    }
                }
                Err(e) => {
                    warn!(key = %name, error = %e, "persist serialization failed");
                }
            }
            Ok(())
        });
        Ok(enhanced)
    }
}

fn encode<T: Serialize>(version: u32, state: T) -> Result<String, serde_json::Error> {
    let record = PersistedRecord {
        version,
        state: serde_json::to_value(state)?,
    };
    serde_json::to_string(&record)
}

fn decode<S>(text: &str) -> Result<(S::Patch, u32), String>
where
    S: State,
    S::Patch: DeserializeOwned,
{
    let record: PersistedRecord = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let patch = serde_json::from_value::<S::Patch>(record.state).map_err(|e| e.to_string())?;
    Ok((patch, record.version))
}
