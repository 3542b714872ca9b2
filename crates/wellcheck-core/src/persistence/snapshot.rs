//! Persisted snapshot envelope and its validation.
//!
//! A snapshot is replaced wholesale on every save. On load it must pass
//! [`validate`]; anything it flags is treated as corruption and the snapshot
//! is discarded rather than repaired.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quiz::{OverallResult, ProgressState, QuizPlan, StageProgress, StageStatus, UserPreferences};

/// Schema version written into every snapshot.
pub const SCHEMA_VERSION: &str = "2.0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub schema_version: String,
    pub stage_progress: BTreeMap<String, StageProgress>,
    #[serde(default)]
    pub overall_result: Option<OverallResult>,
    #[serde(default)]
    pub user_preferences: UserPreferences,
    pub last_saved: DateTime<Utc>,
}

impl PersistedSnapshot {
    pub fn from_state(state: &ProgressState, last_saved: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            stage_progress: state.stage_progress.clone(),
            overall_result: state.overall_result.clone(),
            user_preferences: state.user_preferences.clone(),
            last_saved,
        }
    }

    pub fn into_state(self) -> ProgressState {
        ProgressState {
            stage_progress: self.stage_progress,
            overall_result: self.overall_result,
            user_preferences: self.user_preferences,
        }
    }
}

/// Check structural and semantic invariants against `plan`.
///
/// # Errors
/// Returns every violation found.
pub fn validate(snapshot: &PersistedSnapshot, plan: &QuizPlan) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    if snapshot.schema_version != SCHEMA_VERSION {
        problems.push(format!(
            "schema version {} does not match {SCHEMA_VERSION}",
            snapshot.schema_version
        ));
    }

    for def in plan.stages() {
        let Some(stage) = snapshot.stage_progress.get(&def.id) else {
            problems.push(format!("missing stage '{}'", def.id));
            continue;
        };
        let id = &def.id;
        let max = def.question_count;

        if stage.total_questions() != max {
            problems.push(format!(
                "stage '{id}' has {} questions, expected {max}",
                stage.total_questions()
            ));
        }
        if stage.current_question_index() > max {
            problems.push(format!(
                "stage '{id}' question index {} exceeds {max}",
                stage.current_question_index()
            ));
        }
        if stage.answers().len() > max {
            problems.push(format!(
                "stage '{id}' holds {} answers for {max} questions",
                stage.answers().len()
            ));
        }
        if stage.status() == StageStatus::Completed
            && (stage.result().is_none() || stage.completed_at().is_none())
        {
            problems.push(format!("stage '{id}' is completed without a result"));
        }
        if let Some(result) = stage.result() {
            if result.total_score as usize > max || !result.is_within_bounds() {
                problems.push(format!(
                    "stage '{id}' score {} exceeds maximum {}",
                    result.total_score,
                    max.min(result.max_score as usize)
                ));
            }
        }
        if def.predecessor.is_none() && stage.status() == StageStatus::Locked {
            problems.push(format!("stage '{id}' has no predecessor but is locked"));
        }
    }

    for id in snapshot.stage_progress.keys() {
        if plan.stage(id).is_none() {
            problems.push(format!("unknown stage '{id}'"));
        }
    }

    if let Some(overall) = &snapshot.overall_result {
        if overall.combined_percentage > 100 {
            problems.push(format!(
                "combined percentage {} exceeds 100",
                overall.combined_percentage
            ));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}
