//! Staged quiz: per-stage state machine, stage plan, and the orchestrator
//! that ties them to content and persistence.

mod orchestrator;
mod plan;
mod stage;
mod state;

pub use orchestrator::{Orchestrator, ResumePoint};
pub use plan::{QuizPlan, StageDefinition};
pub use stage::{StageProgress, StageResult, StageStatus};
pub use state::{OverallResult, ProgressState, StageScore, UserPreferences};
