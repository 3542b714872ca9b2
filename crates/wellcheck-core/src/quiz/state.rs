//! Live quiz state owned by the orchestrator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::QuizPlan;
use super::stage::{StageProgress, StageStatus};
use crate::content::FALLBACK_LOCALE;
use crate::scoring::{level_for_percentage, Level};

/// Per-stage line in the overall result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageScore {
    pub stage_id: String,
    pub total_score: u32,
    pub max_score: u32,
    pub percentage: u8,
    pub weight: f64,
}

/// Combination of every completed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallResult {
    pub stage_scores: Vec<StageScore>,
    pub combined_percentage: u8,
    pub combined_level: Level,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl OverallResult {
    /// Weighted mean of the completed stages' percentages, or `None` when no
    /// stage is completed. One completed stage yields its own percentage.
    pub fn combine(
        plan: &QuizPlan,
        stages: &BTreeMap<String, StageProgress>,
        completed_at: DateTime<Utc>,
    ) -> Option<Self> {
        let stage_scores: Vec<StageScore> = plan
            .stages()
            .iter()
            .filter_map(|def| {
                let progress = stages.get(&def.id)?;
                if progress.status() != StageStatus::Completed {
                    return None;
                }
                let result = progress.result()?;
                Some(StageScore {
                    stage_id: def.id.clone(),
                    total_score: result.total_score,
                    max_score: result.max_score,
                    percentage: result.percentage,
                    weight: def.weight.max(0.0),
                })
            })
            .collect();

        if stage_scores.is_empty() {
            return None;
        }

        let weight_sum: f64 = stage_scores.iter().map(|s| s.weight).sum();
        let combined = if stage_scores.len() == 1 || weight_sum <= 0.0 {
            let n = stage_scores.len() as f64;
            stage_scores.iter().map(|s| f64::from(s.percentage)).sum::<f64>() / n
        } else {
            stage_scores
                .iter()
                .map(|s| f64::from(s.percentage) * s.weight)
                .sum::<f64>()
                / weight_sum
        };
        let combined_percentage = combined.round().clamp(0.0, 100.0) as u8;

        Some(Self {
            stage_scores,
            combined_percentage,
            combined_level: level_for_percentage(combined_percentage),
            recommendations: Vec::new(),
            completed_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
    #[serde(default = "default_true")]
    pub show_explanations: bool,
}

fn default_locale() -> String {
    FALLBACK_LOCALE.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            auto_advance: true,
            show_explanations: true,
        }
    }
}

/// Everything that gets persisted, minus the envelope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressState {
    pub stage_progress: BTreeMap<String, StageProgress>,
    pub overall_result: Option<OverallResult>,
    pub user_preferences: UserPreferences,
}

impl ProgressState {
    /// Fresh state for `plan`.
    pub fn for_plan(plan: &QuizPlan) -> Self {
        let mut state = Self::default();
        state.ensure_stages(plan);
        state
    }

    /// Create any stage missing from the map. Existing entries are untouched.
    /// Returns the number of stages created.
    pub fn ensure_stages(&mut self, plan: &QuizPlan) -> usize {
        let mut created = 0;
        for def in plan.stages() {
            if !self.stage_progress.contains_key(&def.id) {
                self.stage_progress.insert(
                    def.id.clone(),
                    StageProgress::new(def.question_count, def.predecessor.is_some()),
                );
                created += 1;
            }
        }
        created
    }
}
