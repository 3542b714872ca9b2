use clap::Subcommand;
use serde::Serialize;
use wellcheck_core::{AnswerValue, Event, Orchestrator, StageStatus};

use super::{open_orchestrator, print_json, CliResult};

#[derive(Subcommand)]
pub enum QuizAction {
    /// Print every stage's status as JSON
    Status,
    /// Start (or restart) a stage
    Start {
        /// Stage ID (e.g. "stage1")
        stage: String,
    },
    /// Print a question of a stage
    Question {
        stage: String,
        /// Question index; defaults to the current one
        index: Option<usize>,
    },
    /// Record an answer for the question at INDEX
    Answer {
        stage: String,
        index: usize,
        /// One value for single choice, several for multi choice
        #[arg(required = true)]
        values: Vec<String>,
    },
    /// Advance to the next question
    Next { stage: String },
    /// Score the recorded answers and complete the stage
    Finish { stage: String },
    /// Reset one stage to not started
    Reset { stage: String },
    /// Reset every stage
    ResetAll,
    /// Print where to resume, or null
    Resume,
    /// Print the overall result, or null
    Result,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StageLine<'a> {
    stage_id: &'a str,
    status: StageStatus,
    unlocked: bool,
    progress: u8,
    current_question_index: usize,
    total_questions: usize,
    percentage: Option<u8>,
}

fn status(quiz: &Orchestrator) -> Vec<StageLine<'_>> {
    quiz.plan()
        .stages()
        .iter()
        .filter_map(|def| {
            let stage = quiz.stage(&def.id)?;
            Some(StageLine {
                stage_id: &def.id,
                status: stage.status(),
                unlocked: stage.is_unlocked(),
                progress: stage.percent_complete(),
                current_question_index: stage.current_question_index(),
                total_questions: stage.total_questions(),
                percentage: stage.result().map(|r| r.percentage),
            })
        })
        .collect()
}

fn answer_value(mut values: Vec<String>) -> AnswerValue {
    if values.len() == 1 {
        AnswerValue::Single(values.remove(0))
    } else {
        AnswerValue::Multiple(values)
    }
}

fn print_events(events: &[Event]) -> CliResult {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

pub fn run(action: QuizAction) -> CliResult {
    let mut quiz = open_orchestrator()?;

    let events = match action {
        QuizAction::Status => return print_json(&status(&quiz)),
        QuizAction::Question { stage, index } => {
            let index = match index {
                Some(index) => index,
                None => quiz
                    .stage(&stage)
                    .map(|s| s.current_question_index())
                    .unwrap_or_default(),
            };
            let question = quiz
                .questions(&stage)?
                .get(index)
                .ok_or_else(|| format!("stage {stage} has no question {index}"))?;
            return print_json(question);
        }
        QuizAction::Resume => return print_json(&quiz.check_resume_point()),
        QuizAction::Result => return print_json(&quiz.overall_result()),
        QuizAction::Start { stage } => vec![quiz.start_stage(&stage)?],
        QuizAction::Answer { stage, index, values } => {
            match quiz.record_answer(&stage, index, answer_value(values))? {
                Some(event) => vec![event],
                None => {
                    eprintln!("answer skipped");
                    Vec::new()
                }
            }
        }
        QuizAction::Next { stage } => quiz.advance(&stage)?.into_iter().collect(),
        QuizAction::Finish { stage } => quiz.finish_stage(&stage)?,
        QuizAction::Reset { stage } => quiz.reset_stage(&stage)?,
        QuizAction::ResetAll => vec![quiz.reset_all()],
    };

    quiz.save()?;
    print_events(&events)
}
