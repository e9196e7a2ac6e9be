//! # formflow-storage
//!
//! Best-effort persistence of in-progress form state.
//!
//! ## Modules
//!
//! - [`backends`] - The synchronous key-value storage collaborator and its
//!   session, local (file), and disabled implementations
//! - [`snapshot`] - The persisted snapshot format
//! - [`debounce`] - A cancel-and-reschedule timer on the tokio runtime
//! - [`persistence`] - The adapter that saves, loads, and clears snapshots

pub mod backends;
pub mod debounce;
pub mod persistence;
pub mod snapshot;

pub use backends::{
    storage_from_settings, DisabledStorage, LocalStorage, SessionStorage, StorageBackend,
};
pub use persistence::PersistenceAdapter;
pub use snapshot::PersistedSnapshot;
