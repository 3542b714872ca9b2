//! Versioned snapshot persistence.
//!
//! - [`BlobStore`]: opaque key-value backend
//! - [`PersistenceManager`]: save / load / export over one fixed key
//! - [`migrate`] and [`validate`]: run on every load and import; failures
//!   hard-reset to defaults instead of repairing
//! - [`AutoSave`]: periodic and lifecycle-driven save bookkeeping

mod autosave;
mod blob_store;
mod bundle;
mod manager;
mod migrations;
mod snapshot;

pub use autosave::{AutoSave, LifecycleEvent, DEFAULT_AUTOSAVE_INTERVAL_SECS};
pub use blob_store::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use bundle::{checksum, ExportBundle};
pub use manager::{PersistenceManager, DEFAULT_STORAGE_KEY};
pub use migrations::migrate;
pub use snapshot::{validate, PersistedSnapshot, SCHEMA_VERSION};
