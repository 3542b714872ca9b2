//! Stage state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Locked -> NotStarted -> InProgress -> Completed
//!               ^              |            |
//!               +--- reset ----+------------+
//! ```
//!
//! Commands return `Some(Event)` when they apply and `None` (with a logged
//! warning) when the current status does not allow them. Scoring is not done
//! here: `complete` stores the caller's result after checking that it is
//! scored out of this stage's question count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::Answer;
use crate::error::QuizError;
use crate::events::Event;
use crate::scoring::{percentage, Level, QuizScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Locked,
    NotStarted,
    InProgress,
    Completed,
}

/// Scored outcome of one stage. Derived from answers, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResult {
    pub total_score: u32,
    pub max_score: u32,
    pub percentage: u8,
    pub level: Level,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub time_spent_secs: u64,
}

impl StageResult {
    pub fn from_score(score: QuizScore, recommendations: Vec<String>, completed_at: DateTime<Utc>) -> Self {
        Self {
            total_score: score.total_score,
            max_score: score.max_score,
            percentage: score.percentage,
            level: score.level,
            recommendations,
            completed_at,
            time_spent_secs: 0,
        }
    }

    pub fn with_time_spent(mut self, secs: u64) -> Self {
        self.time_spent_secs = secs;
        self
    }

    /// `total_score <= max_score` and `percentage <= 100`.
    pub fn is_within_bounds(&self) -> bool {
        self.total_score <= self.max_score && self.percentage <= 100
    }

    /// Scored out of exactly `question_count`, with the percentage derived
    /// from the score.
    pub fn fits(&self, question_count: usize) -> bool {
        usize::try_from(self.max_score).is_ok_and(|max| max == question_count)
            && self.is_within_bounds()
            && self.percentage == percentage(self.total_score, self.max_score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageProgress {
    status: StageStatus,
    current_question_index: usize,
    total_questions: usize,
    /// Positional answers; `None` marks an unanswered slot.
    #[serde(default)]
    answers: Vec<Option<Answer>>,
    #[serde(default)]
    result: Option<StageResult>,
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    time_spent_secs: u64,
}

impl StageProgress {
    /// Fresh stage: `Locked` when it waits on a predecessor, else `NotStarted`.
    pub fn new(total_questions: usize, locked: bool) -> Self {
        Self {
            status: if locked {
                StageStatus::Locked
            } else {
                StageStatus::NotStarted
            },
            current_question_index: 0,
            total_questions,
            answers: Vec::new(),
            result: None,
            started_at: None,
            completed_at: None,
            time_spent_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> StageStatus {
        self.status
    }

    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    pub fn total_questions(&self) -> usize {
        self.total_questions
    }

    pub fn answers(&self) -> &[Option<Answer>] {
        &self.answers
    }

    pub fn result(&self) -> Option<&StageResult> {
        self.result.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn time_spent_secs(&self) -> u64 {
        self.time_spent_secs
    }

    pub fn is_unlocked(&self) -> bool {
        self.status != StageStatus::Locked
    }

    /// 0..=100 progress through the stage.
    pub fn percent_complete(&self) -> u8 {
        match self.status {
            StageStatus::Completed => 100,
            StageStatus::Locked | StageStatus::NotStarted => 0,
            StageStatus::InProgress => {
                if self.total_questions == 0 {
                    return 0;
                }
                let pct = (self.current_question_index as f64 / self.total_questions as f64 * 100.0)
                    .round();
                pct.clamp(0.0, 100.0) as u8
            }
        }
    }

    /// Seconds between `started_at` and `now`, zero when never started.
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        self.started_at
            .map(|start| (now - start).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn unlock(&mut self, stage_id: &str, now: DateTime<Utc>) -> Option<Event> {
        if self.status != StageStatus::Locked {
            return None;
        }
        self.status = StageStatus::NotStarted;
        Some(Event::StageUnlocked {
            stage_id: stage_id.to_string(),
            at: now,
        })
    }

    /// Begin (or restart) the stage with an empty answer sheet.
    pub fn start(&mut self, stage_id: &str, now: DateTime<Utc>) -> Option<Event> {
        match self.status {
            StageStatus::NotStarted | StageStatus::InProgress => {
                self.status = StageStatus::InProgress;
                self.current_question_index = 0;
                self.answers = vec![None; self.total_questions];
                self.result = None;
                self.started_at = Some(now);
                self.completed_at = None;
                self.time_spent_secs = 0;
                Some(Event::StageStarted {
                    stage_id: stage_id.to_string(),
                    total_questions: self.total_questions,
                    at: now,
                })
            }
            status => {
                tracing::warn!(stage_id, ?status, "start ignored");
                None
            }
        }
    }

    /// Upsert the answer at `index`. Indices past the question count are
    /// skipped.
    pub fn record_answer(&mut self, stage_id: &str, index: usize, answer: Answer) -> Option<Event> {
        if self.status != StageStatus::InProgress {
            tracing::warn!(stage_id, status = ?self.status, index, "answer ignored");
            return None;
        }
        if index >= self.total_questions {
            tracing::warn!(
                stage_id,
                index,
                total_questions = self.total_questions,
                "answer index beyond question count; skipped"
            );
            return None;
        }
        if self.answers.len() < self.total_questions {
            self.answers.resize(self.total_questions, None);
        }
        let event = Event::AnswerRecorded {
            stage_id: stage_id.to_string(),
            index,
            question_id: answer.question_id.clone(),
            at: answer.answered_at,
        };
        self.answers[index] = Some(answer);
        Some(event)
    }

    /// Move the question pointer forward by one.
    pub fn advance(&mut self, stage_id: &str, now: DateTime<Utc>) -> Option<Event> {
        if self.status != StageStatus::InProgress {
            tracing::warn!(stage_id, status = ?self.status, "advance ignored");
            return None;
        }
        if self.current_question_index >= self.total_questions {
            tracing::warn!(
                stage_id,
                index = self.current_question_index,
                "advance past the last question"
            );
            return None;
        }
        self.current_question_index += 1;
        Some(Event::QuestionAdvanced {
            stage_id: stage_id.to_string(),
            index: self.current_question_index,
            at: now,
        })
    }

    /// Mark the stage completed with a caller-computed result.
    ///
    /// # Errors
    /// `InvalidTransition` unless the stage is in progress, `InvalidResult`
    /// unless the result is scored out of this stage's question count.
    pub fn complete(
        &mut self,
        stage_id: &str,
        result: StageResult,
        now: DateTime<Utc>,
    ) -> Result<Event, QuizError> {
        if self.status != StageStatus::InProgress {
            return Err(QuizError::InvalidTransition {
                stage: stage_id.to_string(),
                from: self.status,
                action: "complete",
            });
        }
        if !result.fits(self.total_questions) {
            tracing::error!(
                stage_id,
                total_score = result.total_score,
                max_score = result.max_score,
                percentage = result.percentage,
                total_questions = self.total_questions,
                "rejecting result that does not fit the stage"
            );
            return Err(QuizError::InvalidResult {
                stage: stage_id.to_string(),
                total_score: result.total_score,
                max_score: result.max_score,
            });
        }
        if self.answers.len() < self.total_questions {
            self.answers.resize(self.total_questions, None);
        }
        let event = Event::StageCompleted {
            stage_id: stage_id.to_string(),
            total_score: result.total_score,
            max_score: result.max_score,
            percentage: result.percentage,
            level: result.level,
            at: now,
        };
        self.status = StageStatus::Completed;
        self.time_spent_secs = self.elapsed_secs(now);
        self.completed_at = Some(now);
        self.result = Some(result);
        Ok(event)
    }

    /// Back to `NotStarted` with all progress cleared. No-op while locked.
    pub fn reset(&mut self, stage_id: &str, now: DateTime<Utc>) -> Option<Event> {
        if self.status == StageStatus::Locked {
            tracing::warn!(stage_id, "reset ignored on locked stage");
            return None;
        }
        *self = Self::new(self.total_questions, false);
        Some(Event::StageReset {
            stage_id: stage_id.to_string(),
            at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn result(total: u32, max: u32, at: DateTime<Utc>) -> StageResult {
        StageResult {
            total_score: total,
            max_score: max,
            percentage: crate::scoring::percentage(total, max),
            level: Level::Beginner,
            recommendations: Vec::new(),
            completed_at: at,
            time_spent_secs: 0,
        }
    }

    #[test]
    fn start_record_advance_complete() {
        let now = Utc::now();
        let mut stage = StageProgress::new(3, false);
        assert_eq!(stage.status(), StageStatus::NotStarted);

        assert!(stage.start("s", now).is_some());
        assert_eq!(stage.status(), StageStatus::InProgress);
        assert_eq!(stage.answers().len(), 3);

        assert!(stage.record_answer("s", 0, Answer::new("q0", "a")).is_some());
        assert!(stage.advance("s", now).is_some());
        assert_eq!(stage.current_question_index(), 1);

        let done = now + Duration::seconds(90);
        let event = stage.complete("s", result(1, 3, done), done).unwrap();
        assert!(matches!(event, Event::StageCompleted { total_score: 1, .. }));
        assert_eq!(stage.status(), StageStatus::Completed);
        assert_eq!(stage.completed_at(), Some(done));
        assert_eq!(stage.time_spent_secs(), 90);
        assert!(stage.result().is_some());
    }

    #[test]
    fn locked_stage_cannot_start() {
        let mut stage = StageProgress::new(3, true);
        assert!(stage.start("s", Utc::now()).is_none());
        assert_eq!(stage.status(), StageStatus::Locked);
        assert!(stage.unlock("s", Utc::now()).is_some());
        assert!(stage.start("s", Utc::now()).is_some());
    }

    #[test]
    fn unlock_is_noop_when_already_unlocked() {
        let mut stage = StageProgress::new(3, false);
        assert!(stage.unlock("s", Utc::now()).is_none());
    }

    #[test]
    fn out_of_order_answers_leave_empty_slots() {
        let mut stage = StageProgress::new(5, false);
        stage.start("s", Utc::now());

        assert!(stage.record_answer("s", 4, Answer::new("q4", "a")).is_some());

        assert_eq!(stage.answers().len(), 5);
        assert!(stage.answers()[1].is_none());
        assert_eq!(stage.answers()[4].as_ref().unwrap().question_id, "q4");
    }

    #[test]
    fn answer_past_question_count_is_skipped() {
        let mut stage = StageProgress::new(2, false);
        stage.start("s", Utc::now());
        let before = stage.clone();

        assert!(stage.record_answer("s", 2, Answer::new("q2", "a")).is_none());
        assert!(stage.record_answer("s", 7, Answer::new("q7", "a")).is_none());

        assert_eq!(stage, before);
        assert_eq!(stage.answers().len(), 2);
    }

    #[test]
    fn record_answer_requires_in_progress() {
        let mut stage = StageProgress::new(2, false);
        assert!(stage.record_answer("s", 0, Answer::new("q0", "a")).is_none());
        assert!(stage.answers().is_empty());
    }

    #[test]
    fn answers_are_upserted() {
        let mut stage = StageProgress::new(2, false);
        stage.start("s", Utc::now());
        stage.record_answer("s", 0, Answer::new("q0", "a"));
        stage.record_answer("s", 0, Answer::new("q0", "b"));
        assert_eq!(stage.answers()[0].as_ref().unwrap().selected, vec!["b"]);
    }

    #[test]
    fn advance_stops_at_question_count() {
        let now = Utc::now();
        let mut stage = StageProgress::new(2, false);
        stage.start("s", now);
        assert!(stage.advance("s", now).is_some());
        assert!(stage.advance("s", now).is_some());
        assert!(stage.advance("s", now).is_none());
        assert_eq!(stage.current_question_index(), 2);
    }

    #[test]
    fn complete_rejects_score_above_max() {
        let now = Utc::now();
        let mut stage = StageProgress::new(2, false);
        stage.start("s", now);
        let mut bad = result(2, 2, now);
        bad.total_score = 3;

        let err = stage.complete("s", bad, now).unwrap_err();

        assert!(matches!(err, QuizError::InvalidResult { total_score: 3, max_score: 2, .. }));
        assert_eq!(stage.status(), StageStatus::InProgress);
    }

    #[test]
    fn complete_rejects_result_for_another_question_count() {
        let now = Utc::now();
        let mut stage = StageProgress::new(5, false);
        stage.start("s", now);

        let err = stage.complete("s", result(7, 10, now), now).unwrap_err();
        assert!(matches!(err, QuizError::InvalidResult { total_score: 7, max_score: 10, .. }));

        let mut skewed = result(3, 5, now);
        skewed.percentage = 90;
        assert!(stage.complete("s", skewed, now).is_err());

        assert_eq!(stage.status(), StageStatus::InProgress);
        assert!(stage.complete("s", result(3, 5, now), now).is_ok());
    }

    #[test]
    fn complete_requires_in_progress() {
        let now = Utc::now();
        let mut stage = StageProgress::new(2, false);
        let err = stage.complete("s", result(1, 2, now), now).unwrap_err();
        assert!(matches!(err, QuizError::InvalidTransition { action: "complete", .. }));
    }

    #[test]
    fn reset_is_idempotent() {
        let now = Utc::now();
        let mut stage = StageProgress::new(3, false);
        stage.start("s", now);
        stage.record_answer("s", 1, Answer::new("q1", "a"));

        stage.reset("s", now);
        let once = stage.clone();
        stage.reset("s", now);

        assert_eq!(stage, once);
        assert_eq!(stage.status(), StageStatus::NotStarted);
        assert!(stage.answers().is_empty());
    }

    #[test]
    fn reset_ignored_while_locked() {
        let mut stage = StageProgress::new(3, true);
        assert!(stage.reset("s", Utc::now()).is_none());
        assert_eq!(stage.status(), StageStatus::Locked);
    }

    #[test]
    fn percent_complete_by_status() {
        let now = Utc::now();
        let mut stage = StageProgress::new(4, false);
        assert_eq!(stage.percent_complete(), 0);
        stage.start("s", now);
        stage.advance("s", now);
        assert_eq!(stage.percent_complete(), 25);
        stage.complete("s", result(1, 4, now), now).unwrap();
        assert_eq!(stage.percent_complete(), 100);
    }
}
