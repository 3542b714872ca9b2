//! Multi-stage orchestrator.
//!
//! Owns every stage's progress, enforces unlock preconditions, recomputes the
//! overall result, and drives persistence. Constructed once per session with
//! its content and persistence injected; nothing here is global.
//!
//! ## Usage
//!
//! ```ignore
//! let mut quiz = Orchestrator::restore(QuizPlan::default(), Box::new(library), persistence);
//! quiz.start_stage("stage1")?;
//! quiz.record_answer("stage1", 0, "21-35")?;
//! quiz.advance("stage1")?;
//! // ...
//! quiz.finish_stage("stage1")?;
//! // In a loop:
//! quiz.tick(Utc::now()); // Saves when due and changed
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::{QuizPlan, StageDefinition};
use super::stage::{StageProgress, StageResult, StageStatus};
use super::state::{OverallResult, ProgressState, UserPreferences};
use crate::content::{Answer, AnswerValue, Content, Question, RecommendationKey};
use crate::error::{CoreError, QuizError, Result};
use crate::events::Event;
use crate::persistence::{AutoSave, ExportBundle, LifecycleEvent, PersistenceManager};
use crate::scoring::score_quiz;

/// Where to pick up an interrupted quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    pub stage_id: String,
    pub question_index: usize,
}

pub struct Orchestrator {
    plan: QuizPlan,
    state: ProgressState,
    content: Box<dyn Content>,
    persistence: PersistenceManager,
    autosave: AutoSave,
    last_saved: Option<DateTime<Utc>>,
}

impl Orchestrator {
    /// Fresh orchestrator with default state. Nothing is read from storage.
    pub fn new(plan: QuizPlan, content: Box<dyn Content>, persistence: PersistenceManager) -> Self {
        for def in plan.stages() {
            let available = content.questions(&def.assessment_id, FALLBACK).len();
            if available != def.question_count {
                tracing::warn!(
                    stage_id = %def.id,
                    expected = def.question_count,
                    available,
                    "question bank size differs from plan"
                );
            }
        }
        let state = ProgressState::for_plan(&plan);
        Self {
            plan,
            state,
            content,
            persistence,
            autosave: AutoSave::default(),
            last_saved: None,
        }
    }

    /// Orchestrator resumed from storage, or fresh when nothing usable is
    /// stored.
    pub fn restore(plan: QuizPlan, content: Box<dyn Content>, persistence: PersistenceManager) -> Self {
        let mut orchestrator = Self::new(plan, content, persistence);
        orchestrator.reload();
        orchestrator
    }

    pub fn with_autosave(mut self, autosave: AutoSave) -> Self {
        self.autosave = autosave;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn plan(&self) -> &QuizPlan {
        &self.plan
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn content(&self) -> &dyn Content {
        self.content.as_ref()
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut PersistenceManager {
        &mut self.persistence
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.state.user_preferences
    }

    pub fn locale(&self) -> &str {
        &self.state.user_preferences.locale
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn stage(&self, stage_id: &str) -> Option<&StageProgress> {
        self.state.stage_progress.get(stage_id)
    }

    /// Questions of a stage in the current locale.
    ///
    /// # Errors
    /// `UnknownStage` if the stage is not in the plan.
    pub fn questions(&self, stage_id: &str) -> Result<&[Question]> {
        let def = self.definition(stage_id)?;
        Ok(self.content.questions(&def.assessment_id, self.locale()))
    }

    /// `true` once the stage has left `Locked`. Never mutates state.
    pub fn is_unlocked(&self, stage_id: &str) -> bool {
        self.stage(stage_id).is_some_and(StageProgress::is_unlocked)
    }

    /// 0..=100 progress through a stage; `None` for unknown stages.
    pub fn progress(&self, stage_id: &str) -> Option<u8> {
        self.stage(stage_id).map(StageProgress::percent_complete)
    }

    pub fn overall_result(&self) -> Option<&OverallResult> {
        self.state.overall_result.as_ref()
    }

    /// First stage, in plan order, that is in progress.
    pub fn check_resume_point(&self) -> Option<ResumePoint> {
        self.plan.stages().iter().find_map(|def| {
            let stage = self.stage(&def.id)?;
            (stage.status() == StageStatus::InProgress).then(|| ResumePoint {
                stage_id: def.id.clone(),
                question_index: stage.current_question_index(),
            })
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// # Errors
    /// `UnknownStage`, `StageLocked`, or `InvalidTransition` for a completed
    /// stage.
    pub fn start_stage(&mut self, stage_id: &str) -> Result<Event> {
        let now = Utc::now();
        let stage = self.stage_mut(stage_id)?;
        match stage.status() {
            StageStatus::Locked => Err(QuizError::StageLocked(stage_id.to_string()).into()),
            StageStatus::Completed => Err(invalid(stage_id, StageStatus::Completed, "start")),
            _ => stage
                .start(stage_id, now)
                .ok_or_else(|| invalid(stage_id, stage.status(), "start")),
        }
    }

    /// Record a UI answer for the question at `index`.
    ///
    /// An index with no question behind it, or an answer failing the
    /// question's validation, is logged and skipped (`Ok(None)`).
    ///
    /// # Errors
    /// `UnknownStage`, or `InvalidTransition` unless the stage is in progress.
    pub fn record_answer(
        &mut self,
        stage_id: &str,
        index: usize,
        value: impl Into<AnswerValue>,
    ) -> Result<Option<Event>> {
        let Some(question) = self.questions(stage_id)?.get(index) else {
            tracing::warn!(stage_id, index, "no question at index; answer skipped");
            self.ensure_in_progress(stage_id, "answer")?;
            return Ok(None);
        };
        let answer = Answer::new(question.id.clone(), value);
        if let Err(reason) = question.check(&answer) {
            tracing::warn!(stage_id, index, %reason, "answer failed validation; skipped");
            self.ensure_in_progress(stage_id, "answer")?;
            return Ok(None);
        }
        self.record(stage_id, index, answer)
    }

    /// Record an already-normalized answer at `index`.
    ///
    /// # Errors
    /// `UnknownStage`, or `InvalidTransition` unless the stage is in progress.
    pub fn record(&mut self, stage_id: &str, index: usize, answer: Answer) -> Result<Option<Event>> {
        self.ensure_in_progress(stage_id, "answer")?;
        Ok(self.stage_mut(stage_id)?.record_answer(stage_id, index, answer))
    }

    /// Move to the next question. Advancing past the end is a logged no-op.
    ///
    /// # Errors
    /// `UnknownStage`, or `InvalidTransition` unless the stage is in progress.
    pub fn advance(&mut self, stage_id: &str) -> Result<Option<Event>> {
        self.ensure_in_progress(stage_id, "advance")?;
        Ok(self.stage_mut(stage_id)?.advance(stage_id, Utc::now()))
    }

    /// Complete a stage with a caller-computed result, unlock its successors
    /// and recompute the overall result.
    ///
    /// # Errors
    /// `UnknownStage`, `InvalidTransition`, or `InvalidResult`.
    pub fn complete_stage(&mut self, stage_id: &str, result: StageResult) -> Result<Vec<Event>> {
        let now = Utc::now();
        let percentage = result.percentage;
        let mut events = vec![self.stage_mut(stage_id)?.complete(stage_id, result, now)?];

        for successor in self.plan.successors(stage_id) {
            if !successor.unlocks_at(percentage) {
                tracing::info!(
                    stage_id = %successor.id,
                    percentage,
                    required = ?successor.min_unlock_percentage,
                    "successor stays locked"
                );
                continue;
            }
            if let Some(stage) = self.state.stage_progress.get_mut(&successor.id) {
                events.extend(stage.unlock(&successor.id, now));
            }
        }

        events.extend(self.recompute_overall(now));
        Ok(events)
    }

    /// Score the recorded answers against the question bank and complete the
    /// stage with the outcome. Unanswered questions count as incorrect, and
    /// the score is always out of the stage's question count.
    ///
    /// # Errors
    /// `UnknownStage` or `InvalidTransition`.
    pub fn finish_stage(&mut self, stage_id: &str) -> Result<Vec<Event>> {
        let now = Utc::now();
        self.ensure_in_progress(stage_id, "finish")?;
        let def = self.definition(stage_id)?;
        let locale = self.locale().to_string();
        let questions = self.content.questions(&def.assessment_id, &locale);
        let stage = self.stage(stage_id).ok_or_else(|| unknown(stage_id))?;

        let count = stage.total_questions();
        if questions.len() != count {
            tracing::warn!(
                stage_id,
                bank = questions.len(),
                total_questions = count,
                "question bank size differs from stage; scoring the stage's questions"
            );
        }
        let scored = &questions[..questions.len().min(count)];
        let score = score_quiz(stage.answers(), scored)
            .out_of(u32::try_from(count).unwrap_or(u32::MAX));
        let recommendations = self
            .content
            .recommendations(RecommendationKey::Level(score.level), &locale);
        let result = StageResult::from_score(score, recommendations, now)
            .with_time_spent(stage.elapsed_secs(now));

        self.complete_stage(stage_id, result)
    }

    /// Clear one stage back to `NotStarted`. Successors keep their unlock.
    ///
    /// # Errors
    /// `UnknownStage`, or `InvalidTransition` for a locked stage.
    pub fn reset_stage(&mut self, stage_id: &str) -> Result<Vec<Event>> {
        let now = Utc::now();
        let stage = self.stage_mut(stage_id)?;
        let was_completed = stage.status() == StageStatus::Completed;
        let event = stage
            .reset(stage_id, now)
            .ok_or_else(|| invalid(stage_id, StageStatus::Locked, "reset"))?;

        let mut events = vec![event];
        if was_completed {
            events.extend(self.recompute_overall(now));
        }
        Ok(events)
    }

    /// Every stage back to its initial state; overall result cleared.
    pub fn reset_all(&mut self) -> Event {
        self.state.stage_progress.clear();
        self.state.ensure_stages(&self.plan);
        self.state.overall_result = None;
        self.autosave.invalidate();
        tracing::info!("all quiz progress reset");
        Event::ProgressReset { at: Utc::now() }
    }

    pub fn set_preferences(&mut self, preferences: UserPreferences) {
        self.state.user_preferences = preferences;
        self.autosave.invalidate();
    }

    // ── Persistence ──────────────────────────────────────────────────

    /// Replace the live state with the stored snapshot, if one is usable.
    pub fn reload(&mut self) -> Option<Event> {
        let snapshot = self.persistence.load(&self.plan)?;
        let last_saved = snapshot.last_saved;
        self.state = snapshot.into_state();
        self.state.ensure_stages(&self.plan);
        self.autosave.record_success(&self.state.stage_progress, last_saved);
        self.last_saved = Some(last_saved);
        tracing::info!(%last_saved, "progress restored");
        Some(Event::ProgressRestored {
            last_saved,
            at: Utc::now(),
        })
    }

    /// Save now and surface any failure.
    ///
    /// # Errors
    /// Returns the persistence error when the write fails.
    pub fn save(&mut self) -> Result<Event> {
        self.save_at(Utc::now()).map_err(CoreError::from)
    }

    /// Periodic auto-save. Saves when the interval has elapsed and the stage
    /// map changed since the last successful save. Failures are logged and
    /// retried on the next due tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if !self.autosave.is_due(now) {
            return None;
        }
        if !self.autosave.has_changes(&self.state.stage_progress) {
            self.autosave.record_attempt(now);
            return None;
        }
        Some(self.auto_save(now))
    }

    /// Save immediately on page hide / unload when anything changed.
    pub fn on_lifecycle(&mut self, event: LifecycleEvent, now: DateTime<Utc>) -> Option<Event> {
        if !self.autosave.is_enabled() || !self.autosave.has_changes(&self.state.stage_progress) {
            return None;
        }
        tracing::debug!(?event, "lifecycle save");
        Some(self.auto_save(now))
    }

    /// Shareable JSON of the current state.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn export_progress(&self) -> Result<String> {
        Ok(self.persistence.export(&self.state, Utc::now())?)
    }

    /// Replace the live state with an exported bundle after full
    /// verification. On any error the live state is left untouched.
    ///
    /// # Errors
    /// Parse, version, checksum, or validation failure.
    pub fn import_progress(&mut self, json: &str) -> Result<Event> {
        let bundle = ExportBundle::from_json(json, &self.plan)?;
        let now = Utc::now();
        self.state = bundle.snapshot.into_state();
        self.state.ensure_stages(&self.plan);
        self.autosave.invalidate();
        tracing::info!(export_id = %bundle.export_id, "progress imported");
        if let Err(e) = self.save_at(now) {
            tracing::warn!(error = %e, "imported progress not yet persisted");
        }
        Ok(Event::ProgressImported {
            export_id: bundle.export_id,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn definition(&self, stage_id: &str) -> Result<&StageDefinition> {
        self.plan.stage(stage_id).ok_or_else(|| unknown(stage_id))
    }

    fn stage_mut(&mut self, stage_id: &str) -> Result<&mut StageProgress> {
        self.state
            .stage_progress
            .get_mut(stage_id)
            .ok_or_else(|| unknown(stage_id))
    }

    fn ensure_in_progress(&self, stage_id: &str, action: &'static str) -> Result<()> {
        let stage = self.stage(stage_id).ok_or_else(|| unknown(stage_id))?;
        match stage.status() {
            StageStatus::InProgress => Ok(()),
            StageStatus::Locked => Err(QuizError::StageLocked(stage_id.to_string()).into()),
            status => Err(invalid(stage_id, status, action)),
        }
    }

    fn recompute_overall(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let mut overall = OverallResult::combine(&self.plan, &self.state.stage_progress, now);
        let event = overall.as_mut().map(|overall| {
            overall.recommendations = self.content.recommendations(
                RecommendationKey::Level(overall.combined_level),
                &self.state.user_preferences.locale,
            );
            Event::OverallRecomputed {
                combined_percentage: overall.combined_percentage,
                combined_level: overall.combined_level,
                completed_stages: overall.stage_scores.len(),
                at: now,
            }
        });
        self.state.overall_result = overall;
        event
    }

    fn save_at(&mut self, now: DateTime<Utc>) -> Result<Event, crate::error::PersistenceError> {
        self.autosave.record_attempt(now);
        self.persistence.save(&self.state, now)?;
        self.autosave.record_success(&self.state.stage_progress, now);
        self.last_saved = Some(now);
        Ok(Event::ProgressSaved { at: now })
    }

    fn auto_save(&mut self, now: DateTime<Utc>) -> Event {
        match self.save_at(now) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "auto-save failed; retrying next tick");
                Event::SaveFailed {
                    reason: e.to_string(),
                    at: now,
                }
            }
        }
    }
}

const FALLBACK: &str = crate::content::FALLBACK_LOCALE;

fn unknown(stage_id: &str) -> CoreError {
    QuizError::UnknownStage(stage_id.to_string()).into()
}

fn invalid(stage_id: &str, from: StageStatus, action: &'static str) -> CoreError {
    QuizError::InvalidTransition {
        stage: stage_id.to_string(),
        from,
        action,
    }
    .into()
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("plan", &self.plan)
            .field("state", &self.state)
            .field("persistence", &self.persistence)
            .field("last_saved", &self.last_saved)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentLibrary;
    use crate::persistence::MemoryBlobStore;
    use crate::quiz::plan::StageDefinition;
    use crate::scoring::{level_for_percentage, percentage, Level};
    use chrono::Duration;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            QuizPlan::default(),
            Box::new(ContentLibrary::builtin().unwrap()),
            PersistenceManager::new(Box::new(MemoryBlobStore::new())),
        )
    }

    fn result(total: u32, max: u32) -> StageResult {
        let pct = percentage(total, max);
        StageResult {
            total_score: total,
            max_score: max,
            percentage: pct,
            level: level_for_percentage(pct),
            recommendations: Vec::new(),
            completed_at: Utc::now(),
            time_spent_secs: 0,
        }
    }

    fn answer_all_correct(quiz: &mut Orchestrator, stage_id: &str) {
        let correct: Vec<Vec<String>> = quiz
            .questions(stage_id)
            .unwrap()
            .iter()
            .map(|q| q.correct.clone())
            .collect();
        for (i, values) in correct.into_iter().enumerate() {
            quiz.record_answer(stage_id, i, values).unwrap();
            quiz.advance(stage_id).unwrap();
        }
    }

    #[test]
    fn initial_stage_statuses() {
        let quiz = orchestrator();
        assert!(quiz.is_unlocked("stage1"));
        assert!(!quiz.is_unlocked("stage2"));
        assert!(!quiz.is_unlocked("stage4"));
        assert!(!quiz.is_unlocked("nope"));
        assert!(quiz.overall_result().is_none());
    }

    #[test]
    fn locked_stage_cannot_start() {
        let mut quiz = orchestrator();
        let err = quiz.start_stage("stage2").unwrap_err();
        assert!(matches!(err, CoreError::Quiz(QuizError::StageLocked(_))));
    }

    #[test]
    fn unknown_stage_is_an_error() {
        let mut quiz = orchestrator();
        let err = quiz.start_stage("stage9").unwrap_err();
        assert!(matches!(err, CoreError::Quiz(QuizError::UnknownStage(_))));
    }

    #[test]
    fn zero_threshold_unlocks_on_low_score() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();

        let events = quiz.complete_stage("stage1", result(1, 5)).unwrap();

        assert!(quiz.is_unlocked("stage2"));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::StageUnlocked { stage_id, .. } if stage_id == "stage2")));
    }

    #[test]
    fn threshold_keeps_successor_locked() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        quiz.complete_stage("stage1", result(5, 5)).unwrap();
        quiz.start_stage("stage2").unwrap();

        quiz.complete_stage("stage2", result(3, 10)).unwrap();

        assert!(!quiz.is_unlocked("stage3"));
    }

    #[test]
    fn overall_combines_with_weights() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        quiz.complete_stage("stage1", result(5, 5)).unwrap();
        assert_eq!(quiz.overall_result().unwrap().combined_percentage, 100);

        quiz.start_stage("stage2").unwrap();
        quiz.complete_stage("stage2", result(5, 10)).unwrap();

        let overall = quiz.overall_result().unwrap();
        assert_eq!(overall.combined_percentage, 65);
        assert_eq!(overall.combined_level, Level::Intermediate);
        assert!(!overall.recommendations.is_empty());
    }

    #[test]
    fn finish_stage_scores_recorded_answers() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        answer_all_correct(&mut quiz, "stage1");

        quiz.finish_stage("stage1").unwrap();

        let result = quiz.stage("stage1").unwrap().result().unwrap();
        assert_eq!(result.total_score, 5);
        assert_eq!(result.max_score, 5);
        assert_eq!(result.level, Level::Expert);
        assert!(!result.recommendations.is_empty());
    }

    #[test]
    fn finish_with_short_answer_array_still_completes() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage2").unwrap_err();
        quiz.start_stage("stage1").unwrap();
        quiz.record_answer("stage1", 0, "21-35").unwrap();

        quiz.finish_stage("stage1").unwrap();

        let stage = quiz.stage("stage1").unwrap();
        assert_eq!(stage.status(), StageStatus::Completed);
        assert_eq!(stage.result().unwrap().total_score, 1);
        assert_eq!(stage.result().unwrap().percentage, 20);
        assert!(quiz.is_unlocked("stage2"));
    }

    #[test]
    fn answer_for_missing_question_is_skipped() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        assert_eq!(quiz.record_answer("stage1", 42, "x").unwrap(), None);
    }

    #[test]
    fn answer_requires_started_stage() {
        let mut quiz = orchestrator();
        let err = quiz.record_answer("stage1", 0, "x").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Quiz(QuizError::InvalidTransition { action: "answer", .. })
        ));
    }

    #[test]
    fn is_unlocked_has_no_side_effects() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        quiz.complete_stage("stage1", result(2, 5)).unwrap();
        let before = quiz.state().clone();
        for id in ["stage1", "stage2", "stage3", "stage4"] {
            quiz.is_unlocked(id);
        }
        assert_eq!(quiz.state(), &before);
    }

    #[test]
    fn reset_stage_keeps_successor_unlocked() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        quiz.complete_stage("stage1", result(4, 5)).unwrap();

        quiz.reset_stage("stage1").unwrap();

        assert_eq!(quiz.stage("stage1").unwrap().status(), StageStatus::NotStarted);
        assert!(quiz.is_unlocked("stage2"));
        assert!(quiz.overall_result().is_none());
    }

    #[test]
    fn reset_stage_twice_matches_once() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        quiz.record_answer("stage1", 0, "14").unwrap();
        quiz.reset_stage("stage1").unwrap();
        let once = quiz.state().clone();
        quiz.reset_stage("stage1").unwrap();
        assert_eq!(quiz.state(), &once);
    }

    #[test]
    fn reset_all_relocks_everything() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        quiz.complete_stage("stage1", result(5, 5)).unwrap();

        quiz.reset_all();

        assert!(!quiz.is_unlocked("stage2"));
        assert!(quiz.overall_result().is_none());
        assert_eq!(quiz.stage("stage1").unwrap().status(), StageStatus::NotStarted);
    }

    #[test]
    fn resume_point_is_first_in_progress_stage() {
        let mut quiz = orchestrator();
        assert!(quiz.check_resume_point().is_none());
        quiz.start_stage("stage1").unwrap();
        quiz.advance("stage1").unwrap();
        quiz.advance("stage1").unwrap();

        let resume = quiz.check_resume_point().unwrap();

        assert_eq!(resume.stage_id, "stage1");
        assert_eq!(resume.question_index, 2);
    }

    #[test]
    fn over_max_result_is_rejected() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        let mut bad = result(5, 5);
        bad.total_score = 6;
        assert!(quiz.complete_stage("stage1", bad).is_err());
        assert_eq!(quiz.stage("stage1").unwrap().status(), StageStatus::InProgress);
    }

    #[test]
    fn result_for_another_question_count_is_rejected_and_progress_survives_reload() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();
        quiz.record_answer("stage1", 0, "21-35").unwrap();

        let err = quiz.complete_stage("stage1", result(7, 10)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Quiz(QuizError::InvalidResult { total_score: 7, max_score: 10, .. })
        ));
        assert!(!quiz.is_unlocked("stage2"));

        quiz.save().unwrap();
        let before = quiz.state().clone();
        assert!(quiz.reload().is_some());
        assert_eq!(quiz.state(), &before);
        assert_eq!(quiz.stage("stage1").unwrap().status(), StageStatus::InProgress);
    }

    #[test]
    fn record_past_question_count_is_skipped_and_progress_survives_reload() {
        let mut quiz = orchestrator();
        quiz.start_stage("stage1").unwrap();

        let answer = Answer::new("stray", "x");
        assert_eq!(quiz.record("stage1", 7, answer).unwrap(), None);
        assert_eq!(quiz.stage("stage1").unwrap().answers().len(), 5);

        quiz.save().unwrap();
        assert!(quiz.reload().is_some());
        assert_eq!(quiz.stage("stage1").unwrap().status(), StageStatus::InProgress);
    }

    #[test]
    fn larger_bank_is_scored_out_of_stage_count() {
        let plan = QuizPlan::new(vec![StageDefinition::new("stage1", 3)]);
        let mut quiz = Orchestrator::new(
            plan,
            Box::new(ContentLibrary::builtin().unwrap()),
            PersistenceManager::new(Box::new(MemoryBlobStore::new())),
        );
        quiz.start_stage("stage1").unwrap();
        answer_all_correct(&mut quiz, "stage1");

        quiz.finish_stage("stage1").unwrap();

        let result = quiz.stage("stage1").unwrap().result().unwrap().clone();
        assert_eq!(result.max_score, 3);
        assert_eq!(result.total_score, 3);
        assert_eq!(result.percentage, 100);
        quiz.save().unwrap();
        assert!(quiz.reload().is_some());
        assert_eq!(quiz.stage("stage1").unwrap().status(), StageStatus::Completed);
    }

    #[test]
    fn tick_saves_only_when_due_and_changed() {
        let mut quiz = orchestrator();
        let t0 = Utc::now();

        assert!(matches!(quiz.tick(t0), Some(Event::ProgressSaved { .. })));
        assert!(quiz.tick(t0 + Duration::seconds(5)).is_none());
        assert!(quiz.tick(t0 + Duration::seconds(10)).is_none());

        quiz.start_stage("stage1").unwrap();
        assert!(quiz.tick(t0 + Duration::seconds(15)).is_none());
        assert!(matches!(
            quiz.tick(t0 + Duration::seconds(20)),
            Some(Event::ProgressSaved { .. })
        ));
    }

    #[test]
    fn lifecycle_saves_immediately_on_change() {
        let mut quiz = orchestrator();
        let now = Utc::now();
        quiz.start_stage("stage1").unwrap();

        assert!(quiz.on_lifecycle(LifecycleEvent::PageHide, now).is_some());
        assert!(quiz.on_lifecycle(LifecycleEvent::BeforeUnload, now).is_none());
        assert_eq!(quiz.last_saved(), Some(now));
    }

    #[test]
    fn failing_store_degrades_to_save_failed() {
        let mut quiz = Orchestrator::new(
            QuizPlan::default(),
            Box::new(ContentLibrary::builtin().unwrap()),
            PersistenceManager::new(Box::new(MemoryBlobStore::with_quota(1))),
        );
        let now = Utc::now();

        assert!(matches!(quiz.tick(now), Some(Event::SaveFailed { .. })));
        assert!(matches!(
            quiz.tick(now + Duration::seconds(10)),
            Some(Event::SaveFailed { .. })
        ));
        assert!(quiz.save().is_err());
    }

    #[test]
    fn custom_plan_without_weights_averages() {
        let plan = QuizPlan::new(vec![
            StageDefinition::new("stage1", 5),
            StageDefinition::new("stage3", 5).after("stage1", None),
        ]);
        let mut quiz = Orchestrator::new(
            plan,
            Box::new(ContentLibrary::builtin().unwrap()),
            PersistenceManager::new(Box::new(MemoryBlobStore::new())),
        );
        quiz.start_stage("stage1").unwrap();
        quiz.complete_stage("stage1", result(5, 5)).unwrap();
        quiz.start_stage("stage3").unwrap();
        quiz.complete_stage("stage3", result(0, 5)).unwrap();

        assert_eq!(quiz.overall_result().unwrap().combined_percentage, 50);
    }
}
