use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors surfaced by store construction and commits.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The state slot is unavailable: either the initial assignment has not
    /// completed yet (a `set` issued from inside the initializer body), or
    /// every handle to the store has been dropped.
    #[error("store state is not initialized")]
    Uninitialized,

    /// A middleware rejected the update, or failed during setup.
    #[error("middleware error: {0}")]
    Middleware(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
