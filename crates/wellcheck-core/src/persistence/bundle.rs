//! Export bundle for sharing or backing up progress.
//!
//! A bundle wraps a snapshot with an export id, timestamp and a SHA-256
//! checksum of the snapshot's canonical JSON. Import re-checks the version,
//! the checksum and the snapshot invariants before anything is applied.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::migrations::migrate;
use super::snapshot::{validate, PersistedSnapshot, SCHEMA_VERSION};
use crate::error::PersistenceError;
use crate::quiz::QuizPlan;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    /// Schema version of the embedded snapshot.
    pub version: String,
    pub export_id: String,
    pub exported_at: DateTime<Utc>,
    /// Hex SHA-256 of the snapshot's canonical JSON.
    pub checksum: String,
    pub snapshot: PersistedSnapshot,
}

impl ExportBundle {
    pub fn new(snapshot: PersistedSnapshot, exported_at: DateTime<Utc>) -> Result<Self, PersistenceError> {
        let checksum = checksum(&snapshot)?;
        Ok(Self {
            version: SCHEMA_VERSION.to_string(),
            export_id: uuid::Uuid::new_v4().to_string(),
            exported_at,
            checksum,
            snapshot,
        })
    }

    /// Serialize the bundle to pretty JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and verify a bundle.
    ///
    /// The embedded snapshot goes through the same migration and validation
    /// as a blob read from the store.
    ///
    /// # Errors
    /// Parse failure, version mismatch, checksum mismatch, or invariant
    /// violations. The checksum is verified whenever the embedded snapshot
    /// was written at the current schema version.
    pub fn from_json(json: &str, plan: &QuizPlan) -> Result<Self, PersistenceError> {
        let mut raw: serde_json::Value = serde_json::from_str(json)?;
        let snapshot = raw
            .get_mut("snapshot")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        let written_as = snapshot
            .get("schemaVersion")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let snapshot: PersistedSnapshot = serde_json::from_value(migrate(snapshot)?)?;

        let expected = raw
            .get("checksum")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let export_id = raw
            .get("exportId")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let exported_at = raw
            .get("exportedAt")
            .cloned()
            .map(serde_json::from_value::<DateTime<Utc>>)
            .transpose()?
            .unwrap_or(snapshot.last_saved);

        // A migrated snapshot no longer matches the checksum of its old shape.
        // The embedded schema version decides, never the outer `version`.
        if written_as == SCHEMA_VERSION {
            let computed = checksum(&snapshot)?;
            if computed != expected {
                return Err(PersistenceError::ChecksumMismatch { expected, computed });
            }
        }

        validate(&snapshot, plan).map_err(PersistenceError::Invalid)?;

        Ok(Self {
            version: SCHEMA_VERSION.to_string(),
            export_id,
            exported_at,
            checksum: checksum(&snapshot)?,
            snapshot,
        })
    }
}

/// Hex SHA-256 of the snapshot's compact JSON.
pub fn checksum(snapshot: &PersistedSnapshot) -> Result<String, PersistenceError> {
    let canonical = serde_json::to_string(snapshot)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}
