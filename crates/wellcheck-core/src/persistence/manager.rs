//! Persistence manager: the single writer of the progress key.

use chrono::{DateTime, Utc};

use super::blob_store::BlobStore;
use super::bundle::ExportBundle;
use super::migrations::migrate;
use super::snapshot::{validate, PersistedSnapshot};
use crate::error::PersistenceError;
use crate::quiz::{ProgressState, QuizPlan};

/// Default backing-store key.
pub const DEFAULT_STORAGE_KEY: &str = "wellcheck-progress";

pub struct PersistenceManager {
    store: Box<dyn BlobStore>,
    key: String,
}

impl PersistenceManager {
    pub fn new(store: Box<dyn BlobStore>) -> Self {
        Self::with_key(store, DEFAULT_STORAGE_KEY)
    }

    pub fn with_key(store: Box<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn BlobStore {
        self.store.as_mut()
    }

    /// Write the whole state as one blob, replacing whatever was there.
    ///
    /// # Errors
    /// Returns an error if serialization or the store write fails.
    pub fn save(&mut self, state: &ProgressState, now: DateTime<Utc>) -> Result<PersistedSnapshot, PersistenceError> {
        let snapshot = PersistedSnapshot::from_state(state, now);
        let blob = serde_json::to_string(&snapshot)?;
        self.store.set(&self.key, &blob)?;
        tracing::debug!(key = %self.key, bytes = blob.len(), "progress saved");
        Ok(snapshot)
    }

    /// Read, migrate and validate the stored snapshot.
    ///
    /// Returns `None` when nothing is stored or when the blob is unusable; an
    /// unusable blob is removed so the caller starts over from defaults.
    pub fn load(&mut self, plan: &QuizPlan) -> Option<PersistedSnapshot> {
        let blob = match self.store.get(&self.key) {
            Ok(Some(blob)) => blob,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "progress read failed");
                return None;
            }
        };

        match Self::decode(&blob, plan) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "discarding stored progress");
                if let Err(e) = self.store.remove(&self.key) {
                    tracing::warn!(key = %self.key, error = %e, "failed to remove discarded progress");
                }
                None
            }
        }
    }

    /// Parse a stored blob with migration and validation.
    ///
    /// # Errors
    /// Parse failure, version mismatch, or invariant violations.
    pub fn decode(blob: &str, plan: &QuizPlan) -> Result<PersistedSnapshot, PersistenceError> {
        let raw: serde_json::Value = serde_json::from_str(blob)?;
        let snapshot: PersistedSnapshot = serde_json::from_value(migrate(raw)?)?;
        validate(&snapshot, plan).map_err(PersistenceError::Invalid)?;
        Ok(snapshot)
    }

    /// Remove the stored snapshot.
    ///
    /// # Errors
    /// Returns an error if the store rejects the removal.
    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.store.remove(&self.key)
    }

    /// Pretty JSON export of `state`.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn export(&self, state: &ProgressState, now: DateTime<Utc>) -> Result<String, PersistenceError> {
        ExportBundle::new(PersistedSnapshot::from_state(state, now), now)?.to_json()
    }
}

impl std::fmt::Debug for PersistenceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceManager")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
