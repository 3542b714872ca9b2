//! Scoring engine.
//!
//! Two pure, total functions:
//!
//! - [`classify`]: weighted multi-category classification for the
//!   constitution test. Every selected option adds
//!   `option.weight * question.weight` to its category.
//! - [`score_quiz`]: binary per-question scoring for quiz stages, mapped onto
//!   a [`Level`] through [`LEVEL_THRESHOLDS`].
//!
//! Neither function fails. Answers that reference unknown questions or
//! unknown option values are logged and skipped.
//!
//! ## Level thresholds
//!
//! | Percentage | Level |
//! |------------|-------|
//! | 0..=30 | Beginner |
//! | 31..=70 | Intermediate |
//! | 71..=90 | Advanced |
//! | 91..=100 | Expert |

use serde::{Deserialize, Serialize};

use crate::content::{Answer, Constitution, Content, Question, RecommendationKey};

/// Assessment id of the constitution classifier in the question bank.
pub const CONSTITUTION_ASSESSMENT: &str = "constitution";

/// Ordered proficiency tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Beginner,
        Level::Intermediate,
        Level::Advanced,
        Level::Expert,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
            Level::Expert => "expert",
        }
    }
}

/// Inclusive upper bound of each tier. Covers 0..=100 without gaps.
pub const LEVEL_THRESHOLDS: [(u8, Level); 4] = [
    (30, Level::Beginner),
    (70, Level::Intermediate),
    (90, Level::Advanced),
    (100, Level::Expert),
];

/// Map a percentage onto its tier. Values above 100 are treated as 100.
pub fn level_for_percentage(percentage: u8) -> Level {
    let p = percentage.min(100);
    LEVEL_THRESHOLDS
        .iter()
        .find(|(upper, _)| p <= *upper)
        .map(|(_, level)| *level)
        .unwrap_or(Level::Expert)
}

/// `round(part / whole * 100)`, clamped to 0..=100. Zero when `whole` is 0.
pub fn percentage(part: u32, whole: u32) -> u8 {
    if whole == 0 {
        return 0;
    }
    let pct = (f64::from(part) / f64::from(whole) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Constitution,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Every category, in declaration order.
    pub scores: Vec<CategoryScore>,
    /// Highest-scoring category. `None` when inconclusive.
    pub primary: Option<Constitution>,
    /// Second-highest nonzero category.
    pub secondary: Option<Constitution>,
    /// Share of the primary category in the total, 0..=100.
    pub confidence: u8,
    /// No scorable answers were submitted.
    pub inconclusive: bool,
}

impl ClassificationResult {
    pub fn score(&self, category: Constitution) -> f64 {
        self.scores
            .iter()
            .find(|s| s.category == category)
            .map(|s| s.score)
            .unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.scores.iter().map(|s| s.score).sum()
    }
}

/// Classify a set of answers against a question bank.
///
/// Ties are broken by bank iteration order: walking questions in order and
/// their options in order, the category met first wins. Categories the bank
/// never mentions rank after those, in declaration order.
pub fn classify(answers: &[Answer], questions: &[Question]) -> ClassificationResult {
    let mut totals = [0.0_f64; Constitution::ALL.len()];
    let index_of = |c: Constitution| Constitution::ALL.iter().position(|x| *x == c).unwrap_or(0);

    for answer in answers {
        let Some(question) = questions.iter().find(|q| q.id == answer.question_id) else {
            tracing::debug!(question_id = %answer.question_id, "skipping answer for unknown question");
            continue;
        };
        for value in &answer.selected {
            let Some(option) = question.option(value) else {
                tracing::debug!(question_id = %question.id, %value, "skipping unmatched option value");
                continue;
            };
            let Some(category) = option.category else {
                tracing::debug!(question_id = %question.id, %value, "option has no category");
                continue;
            };
            totals[index_of(category)] += option.weight * question.weight;
        }
    }

    let scores: Vec<CategoryScore> = Constitution::ALL
        .iter()
        .zip(totals.iter())
        .map(|(category, score)| CategoryScore {
            category: *category,
            score: *score,
        })
        .collect();

    let order = tie_break_order(questions);
    let score_of = |c: Constitution| totals[index_of(c)];
    let total: f64 = totals.iter().sum();

    let primary = pick_highest(&order, &score_of, None);
    let primary_score = primary.map(&score_of).unwrap_or(0.0);

    if total <= 0.0 || primary_score <= 0.0 {
        return ClassificationResult {
            scores,
            primary: None,
            secondary: None,
            confidence: 0,
            inconclusive: true,
        };
    }

    let secondary = pick_highest(&order, &score_of, primary);
    let confidence = (primary_score / total * 100.0).round().clamp(0.0, 100.0) as u8;

    ClassificationResult {
        scores,
        primary,
        secondary,
        confidence,
        inconclusive: false,
    }
}

fn tie_break_order(questions: &[Question]) -> Vec<Constitution> {
    let mut order: Vec<Constitution> = Vec::with_capacity(Constitution::ALL.len());
    let mentioned = questions
        .iter()
        .flat_map(|q| q.options.iter())
        .filter_map(|o| o.category);
    for category in mentioned.chain(Constitution::ALL) {
        if !order.contains(&category) {
            order.push(category);
        }
    }
    order
}

/// First category in `order` holding the strictly highest positive score.
fn pick_highest(
    order: &[Constitution],
    score_of: impl Fn(Constitution) -> f64,
    exclude: Option<Constitution>,
) -> Option<Constitution> {
    let mut best: Option<(Constitution, f64)> = None;
    for &category in order {
        if Some(category) == exclude {
            continue;
        }
        let score = score_of(category);
        if score <= 0.0 {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((category, score)),
        }
    }
    best.map(|(c, _)| c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizScore {
    pub total_score: u32,
    pub max_score: u32,
    pub percentage: u8,
    pub level: Level,
}

impl QuizScore {
    /// Restate the score out of `max_score` questions. Questions beyond the
    /// scored ones count as incorrect.
    pub fn out_of(self, max_score: u32) -> Self {
        let total_score = self.total_score.min(max_score);
        let percentage = percentage(total_score, max_score);
        Self {
            total_score,
            max_score,
            percentage,
            level: level_for_percentage(percentage),
        }
    }
}

/// Score a quiz stage: one point per correctly answered question.
///
/// `answers` is the stage's positional answer array. A slot is used when its
/// question id matches the question at that position; otherwise the answer is
/// looked up by question id. Missing answers count as incorrect.
pub fn score_quiz(answers: &[Option<Answer>], questions: &[Question]) -> QuizScore {
    let mut total_score = 0_u32;

    for (index, question) in questions.iter().enumerate() {
        let positional = answers
            .get(index)
            .and_then(Option::as_ref)
            .filter(|a| a.question_id == question.id);
        let answer = positional.or_else(|| {
            answers
                .iter()
                .flatten()
                .find(|a| a.question_id == question.id)
        });
        if answer.is_some_and(|a| question.is_correct(a)) {
            total_score += 1;
        }
    }

    for answer in answers.iter().flatten() {
        if !questions.iter().any(|q| q.id == answer.question_id) {
            tracing::debug!(question_id = %answer.question_id, "ignoring answer for unknown question");
        }
    }

    let max_score = u32::try_from(questions.len()).unwrap_or(u32::MAX);
    let percentage = percentage(total_score, max_score);
    QuizScore {
        total_score,
        max_score,
        percentage,
        level: level_for_percentage(percentage),
    }
}

/// Classification plus the recommendations for its primary type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionReport {
    pub classification: ClassificationResult,
    pub recommendations: Vec<String>,
}

/// Run the constitution classifier for `locale` and attach recommendations.
pub fn assess_constitution(
    content: &dyn Content,
    locale: &str,
    answers: &[Answer],
) -> ConstitutionReport {
    let questions = content.questions(CONSTITUTION_ASSESSMENT, locale);
    let classification = classify(answers, questions);
    let recommendations = classification
        .primary
        .map(|c| content.recommendations(RecommendationKey::Constitution(c), locale))
        .unwrap_or_default();
    ConstitutionReport {
        classification,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentLibrary, QuestionKind, QuestionOption};

    fn option(value: &str, weight: f64, category: Constitution) -> QuestionOption {
        QuestionOption::new(value, weight, Some(category))
    }

    #[test]
    fn single_choice_weighted_score() {
        let questions = vec![Question::new(
            "q1",
            QuestionKind::Single,
            vec![
                option("a", 3.0, Constitution::QiDeficiency),
                option("b", 1.0, Constitution::Balanced),
            ],
        )
        .with_weight(2.0)];

        let result = classify(&[Answer::new("q1", "a")], &questions);

        assert_eq!(result.score(Constitution::QiDeficiency), 6.0);
        assert_eq!(result.total(), 6.0);
        assert_eq!(result.primary, Some(Constitution::QiDeficiency));
        assert_eq!(result.secondary, None);
        assert_eq!(result.confidence, 100);
        assert!(!result.inconclusive);
    }

    #[test]
    fn multi_select_sums_each_option() {
        let questions = vec![Question::new(
            "q1",
            QuestionKind::Multi,
            vec![
                option("opt1", 2.0, Constitution::DampHeat),
                option("opt2", 5.0, Constitution::Balanced),
                option("opt3", 1.0, Constitution::BloodStasis),
            ],
        )];

        let result = classify(&[Answer::new("q1", vec!["opt1", "opt3"])], &questions);

        assert_eq!(result.score(Constitution::DampHeat), 2.0);
        assert_eq!(result.score(Constitution::BloodStasis), 1.0);
        assert_eq!(result.score(Constitution::Balanced), 0.0);
        assert_eq!(result.primary, Some(Constitution::DampHeat));
        assert_eq!(result.secondary, Some(Constitution::BloodStasis));
        assert_eq!(result.confidence, 67);
    }

    #[test]
    fn ties_follow_bank_order() {
        let questions = vec![Question::new(
            "q1",
            QuestionKind::Multi,
            vec![
                option("x", 1.0, Constitution::SpecialDiathesis),
                option("y", 1.0, Constitution::Balanced),
            ],
        )];

        let result = classify(&[Answer::new("q1", vec!["y", "x"])], &questions);

        assert_eq!(result.primary, Some(Constitution::SpecialDiathesis));
        assert_eq!(result.secondary, Some(Constitution::Balanced));
        assert_eq!(result.confidence, 50);
    }

    #[test]
    fn no_scorable_answers_is_inconclusive() {
        let questions = vec![Question::new(
            "q1",
            QuestionKind::Single,
            vec![option("a", 1.0, Constitution::Balanced)],
        )];

        let result = classify(
            &[Answer::new("missing", "a"), Answer::new("q1", "zzz")],
            &questions,
        );

        assert!(result.inconclusive);
        assert_eq!(result.primary, None);
        assert_eq!(result.confidence, 0);
        assert_eq!(result.scores.len(), Constitution::ALL.len());
    }

    #[test]
    fn scale_question_resolves_integer_answers() {
        let questions = vec![Question::scale("pain", 0..=10, |v| {
            if v > 5 {
                Constitution::BloodStasis
            } else {
                Constitution::Balanced
            }
        })];

        let result = classify(&[Answer::new("pain", 8_i64)], &questions);

        assert_eq!(result.primary, Some(Constitution::BloodStasis));
        assert_eq!(result.score(Constitution::BloodStasis), 8.0);
    }

    #[test]
    fn level_thresholds_partition_percentages() {
        assert_eq!(level_for_percentage(0), Level::Beginner);
        assert_eq!(level_for_percentage(30), Level::Beginner);
        assert_eq!(level_for_percentage(31), Level::Intermediate);
        assert_eq!(level_for_percentage(70), Level::Intermediate);
        assert_eq!(level_for_percentage(71), Level::Advanced);
        assert_eq!(level_for_percentage(90), Level::Advanced);
        assert_eq!(level_for_percentage(91), Level::Expert);
        assert_eq!(level_for_percentage(100), Level::Expert);
        assert_eq!(level_for_percentage(250), Level::Expert);
    }

    #[test]
    fn level_thresholds_are_ordered() {
        for pair in LEVEL_THRESHOLDS.windows(2) {
            assert!(pair[0].0 < pair[1].0);
            assert!(pair[0].1 < pair[1].1);
        }
        assert_eq!(LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1].0, 100);
    }

    fn quiz(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| {
                Question::new(
                    format!("q{i}"),
                    QuestionKind::Single,
                    vec![
                        QuestionOption::new("right", 1.0, None),
                        QuestionOption::new("wrong", 1.0, None),
                    ],
                )
                .with_correct(["right"])
            })
            .collect()
    }

    #[test]
    fn seven_of_ten_is_intermediate() {
        let questions = quiz(10);
        let answers: Vec<Option<Answer>> = (0..10)
            .map(|i| {
                let value = if i < 7 { "right" } else { "wrong" };
                Some(Answer::new(format!("q{i}"), value))
            })
            .collect();

        let score = score_quiz(&answers, &questions);

        assert_eq!(score.total_score, 7);
        assert_eq!(score.max_score, 10);
        assert_eq!(score.percentage, 70);
        assert_eq!(score.level, Level::Intermediate);
    }

    #[test]
    fn short_answer_array_scores_missing_as_incorrect() {
        let questions = quiz(5);
        let answers = vec![Some(Answer::new("q0", "right")), None, Some(Answer::new("q2", "right"))];

        let score = score_quiz(&answers, &questions);

        assert_eq!(score.total_score, 2);
        assert_eq!(score.max_score, 5);
        assert_eq!(score.percentage, 40);
    }

    #[test]
    fn misplaced_answers_are_found_by_id() {
        let questions = quiz(3);
        let answers = vec![
            Some(Answer::new("q2", "right")),
            Some(Answer::new("unknown", "right")),
            Some(Answer::new("q0", "right")),
        ];

        let score = score_quiz(&answers, &questions);

        assert_eq!(score.total_score, 2);
    }

    #[test]
    fn score_restated_out_of_more_questions() {
        let questions = quiz(3);
        let answers: Vec<Option<Answer>> =
            (0..3).map(|i| Some(Answer::new(format!("q{i}"), "right"))).collect();

        let score = score_quiz(&answers, &questions).out_of(5);

        assert_eq!(score.total_score, 3);
        assert_eq!(score.max_score, 5);
        assert_eq!(score.percentage, 60);
        assert_eq!(score.level, Level::Intermediate);
    }

    #[test]
    fn empty_quiz_scores_zero() {
        let score = score_quiz(&[], &[]);
        assert_eq!(score.max_score, 0);
        assert_eq!(score.percentage, 0);
        assert_eq!(score.level, Level::Beginner);
    }

    #[test]
    fn constitution_report_carries_recommendations() {
        let library = ContentLibrary::builtin().unwrap();
        let answers = vec![
            Answer::new("energy", "tired_easily"),
            Answer::new("symptoms", vec!["shortness_of_breath"]),
        ];

        let report = assess_constitution(&library, "en", &answers);

        assert_eq!(report.classification.primary, Some(Constitution::QiDeficiency));
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn inconclusive_report_has_no_recommendations() {
        let library = ContentLibrary::builtin().unwrap();
        let report = assess_constitution(&library, "en", &[]);
        assert!(report.classification.inconclusive);
        assert!(report.recommendations.is_empty());
    }
}
