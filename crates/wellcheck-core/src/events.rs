use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::Level;

/// Every state change in the engine produces an Event.
/// The UI renders from them; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StageStarted {
        stage_id: String,
        total_questions: usize,
        at: DateTime<Utc>,
    },
    AnswerRecorded {
        stage_id: String,
        index: usize,
        question_id: String,
        at: DateTime<Utc>,
    },
    QuestionAdvanced {
        stage_id: String,
        index: usize,
        at: DateTime<Utc>,
    },
    StageCompleted {
        stage_id: String,
        total_score: u32,
        max_score: u32,
        percentage: u8,
        level: Level,
        at: DateTime<Utc>,
    },
    /// A downstream stage left `locked`.
    StageUnlocked {
        stage_id: String,
        at: DateTime<Utc>,
    },
    StageReset {
        stage_id: String,
        at: DateTime<Utc>,
    },
    /// Every stage returned to its initial state.
    ProgressReset {
        at: DateTime<Utc>,
    },
    OverallRecomputed {
        combined_percentage: u8,
        combined_level: Level,
        completed_stages: usize,
        at: DateTime<Utc>,
    },
    ProgressSaved {
        at: DateTime<Utc>,
    },
    /// A save attempt failed; automatic saves retry on the next tick.
    SaveFailed {
        reason: String,
        at: DateTime<Utc>,
    },
    /// Prior progress was loaded from the store.
    ProgressRestored {
        last_saved: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    ProgressImported {
        export_id: String,
        at: DateTime<Utc>,
    },
}
