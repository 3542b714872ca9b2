//! Snapshot migrations.
//!
//! Migrations run on the raw JSON before it is parsed, one step at a time,
//! until the blob carries [`SCHEMA_VERSION`]. A blob whose version has no
//! registered step is rejected; the caller then starts from defaults.

use serde_json::Value;

use super::snapshot::SCHEMA_VERSION;
use crate::error::PersistenceError;

type MigrationFn = fn(&mut Value);

/// `(from, to, step)` in application order.
const MIGRATIONS: &[(&str, &str, MigrationFn)] = &[("2.0.0", "2.0.1", migrate_2_0_0)];

/// Bring `blob` up to [`SCHEMA_VERSION`].
///
/// # Errors
/// `VersionMismatch` if the version is missing or has no migration path.
pub fn migrate(mut blob: Value) -> Result<Value, PersistenceError> {
    loop {
        let version = blob
            .get("schemaVersion")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        if version == SCHEMA_VERSION {
            return Ok(blob);
        }

        let Some((_, to, step)) = MIGRATIONS.iter().find(|(from, _, _)| *from == version) else {
            return Err(PersistenceError::VersionMismatch {
                found: if version.is_empty() {
                    "<none>".to_string()
                } else {
                    version
                },
                expected: SCHEMA_VERSION.to_string(),
            });
        };

        tracing::info!(from = %version, to = %to, "migrating snapshot");
        step(&mut blob);
        blob["schemaVersion"] = Value::String((*to).to_string());
    }
}

/// 2.0.0 spelled `not_started` as `available` and stored `timeSpent` in
/// milliseconds.
fn migrate_2_0_0(blob: &mut Value) {
    let Some(stages) = blob
        .get_mut("stageProgress")
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    for stage in stages.values_mut() {
        let Some(stage) = stage.as_object_mut() else {
            continue;
        };
        if stage.get("status").and_then(Value::as_str) == Some("available") {
            stage.insert("status".into(), Value::String("not_started".into()));
        }
        if let Some(ms) = stage.remove("timeSpent").and_then(|v| v.as_u64()) {
            stage.insert("timeSpentSecs".into(), Value::from(ms / 1000));
        }
    }
}
