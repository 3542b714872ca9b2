//! Question, option and answer types.
//!
//! Option values and answer selections are always strings. Bank files may
//! write numeric values (`value = 3`); they are coerced to `"3"` at load time
//! so that an answer recorded as the integer `3` and the option compare equal.

use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Constitution type produced by the weighted classifier.
///
/// Exactly one neutral category (`Balanced`) and eight deviation types.
/// Declaration order is the fallback tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constitution {
    Balanced,
    QiDeficiency,
    YangDeficiency,
    YinDeficiency,
    PhlegmDampness,
    DampHeat,
    BloodStasis,
    QiStagnation,
    SpecialDiathesis,
}

impl Constitution {
    pub const ALL: [Constitution; 9] = [
        Constitution::Balanced,
        Constitution::QiDeficiency,
        Constitution::YangDeficiency,
        Constitution::YinDeficiency,
        Constitution::PhlegmDampness,
        Constitution::DampHeat,
        Constitution::BloodStasis,
        Constitution::QiStagnation,
        Constitution::SpecialDiathesis,
    ];

    pub fn is_balanced(self) -> bool {
        self == Constitution::Balanced
    }

    /// Stable snake_case key, as used in content files.
    pub fn key(self) -> &'static str {
        match self {
            Constitution::Balanced => "balanced",
            Constitution::QiDeficiency => "qi_deficiency",
            Constitution::YangDeficiency => "yang_deficiency",
            Constitution::YinDeficiency => "yin_deficiency",
            Constitution::PhlegmDampness => "phlegm_dampness",
            Constitution::DampHeat => "damp_heat",
            Constitution::BloodStasis => "blood_stasis",
            Constitution::QiStagnation => "qi_stagnation",
            Constitution::SpecialDiathesis => "special_diathesis",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Single,
    Multi,
    Scale,
}

/// Optional selection-count constraints checked when an answer is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Validation {
    #[serde(default)]
    pub min_selections: Option<usize>,
    #[serde(default)]
    pub max_selections: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(deserialize_with = "value_as_string")]
    pub value: String,
    /// Option-level score.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Target category for the classifier. Quiz options leave this empty.
    #[serde(default)]
    pub category: Option<Constitution>,
}

impl QuestionOption {
    pub fn new(value: impl Into<String>, weight: f64, category: Option<Constitution>) -> Self {
        Self {
            value: value.into(),
            weight,
            category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub text: String,
    /// Question-level multiplier.
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    /// Canonical correct values for quiz questions.
    #[serde(default, deserialize_with = "values_as_strings")]
    pub correct: Vec<String>,
    #[serde(default)]
    pub validation: Option<Validation>,
}

impl Question {
    pub fn new(id: impl Into<String>, kind: QuestionKind, options: Vec<QuestionOption>) -> Self {
        Self {
            id: id.into(),
            kind,
            text: String::new(),
            weight: 1.0,
            options,
            correct: Vec::new(),
            validation: None,
        }
    }

    /// Build a scale question with one option per integer in `range`.
    ///
    /// Each option's weight is its own value; `bucket` assigns the category.
    pub fn scale(
        id: impl Into<String>,
        range: RangeInclusive<i64>,
        bucket: impl Fn(i64) -> Constitution,
    ) -> Self {
        let options = range
            .map(|v| QuestionOption::new(v.to_string(), v as f64, Some(bucket(v))))
            .collect();
        Self::new(id, QuestionKind::Scale, options)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_correct<I, S>(mut self, correct: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.correct = correct.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Find the option whose value equals `value` after string coercion.
    pub fn option(&self, value: &str) -> Option<&QuestionOption> {
        self.options.iter().find(|o| o.value == value)
    }

    /// Whether `answer` earns the point for this question.
    ///
    /// Single choice needs exactly one selection equal to the correct value.
    /// Multi choice needs the selected set to equal the correct set; there is
    /// no partial credit.
    pub fn is_correct(&self, answer: &Answer) -> bool {
        if self.correct.is_empty() {
            return false;
        }
        match self.kind {
            QuestionKind::Multi => {
                let mut selected: Vec<&str> = answer.selected.iter().map(String::as_str).collect();
                let mut correct: Vec<&str> = self.correct.iter().map(String::as_str).collect();
                selected.sort_unstable();
                selected.dedup();
                correct.sort_unstable();
                correct.dedup();
                selected == correct
            }
            QuestionKind::Single | QuestionKind::Scale => {
                answer.selected.len() == 1 && answer.selected[0] == self.correct[0]
            }
        }
    }

    /// Check the answer against the optional selection constraints.
    pub fn check(&self, answer: &Answer) -> Result<(), String> {
        let Some(validation) = self.validation else {
            return Ok(());
        };
        let count = answer.selected.len();
        if let Some(min) = validation.min_selections {
            if count < min {
                return Err(format!(
                    "question '{}' needs at least {min} selections, got {count}",
                    self.id
                ));
            }
        }
        if let Some(max) = validation.max_selections {
            if count > max {
                return Err(format!(
                    "question '{}' allows at most {max} selections, got {count}",
                    self.id
                ));
            }
        }
        Ok(())
    }
}

/// Raw answer value as delivered by a UI.
///
/// Normalized once into an [`Answer`]; nothing downstream branches on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

impl AnswerValue {
    /// Ordered set of selections: empty strings dropped, duplicates removed,
    /// first occurrence kept.
    pub fn into_selected(self) -> Vec<String> {
        let raw = match self {
            AnswerValue::Single(v) => vec![v],
            AnswerValue::Multiple(vs) => vs,
        };
        let mut selected: Vec<String> = Vec::with_capacity(raw.len());
        for v in raw {
            let v = v.trim().to_string();
            if !v.is_empty() && !selected.contains(&v) {
                selected.push(v);
            }
        }
        selected
    }
}

impl From<&str> for AnswerValue {
    fn from(v: &str) -> Self {
        AnswerValue::Single(v.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(v: String) -> Self {
        AnswerValue::Single(v)
    }
}

impl From<i64> for AnswerValue {
    fn from(v: i64) -> Self {
        AnswerValue::Single(v.to_string())
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(vs: Vec<String>) -> Self {
        AnswerValue::Multiple(vs)
    }
}

impl From<Vec<&str>> for AnswerValue {
    fn from(vs: Vec<&str>) -> Self {
        AnswerValue::Multiple(vs.into_iter().map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: String,
    pub selected: Vec<String>,
    pub answered_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(question_id: impl Into<String>, value: impl Into<AnswerValue>) -> Self {
        Self::at(question_id, value, Utc::now())
    }

    pub fn at(
        question_id: impl Into<String>,
        value: impl Into<AnswerValue>,
        answered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            selected: value.into().into_selected(),
            answered_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl RawValue {
    fn into_string(self) -> String {
        match self {
            RawValue::Text(s) => s,
            RawValue::Int(i) => i.to_string(),
            RawValue::Float(f) => f.to_string(),
            RawValue::Bool(b) => b.to_string(),
        }
    }
}

fn value_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(RawValue::deserialize(deserializer)?.into_string())
}

fn values_as_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = Vec::<RawValue>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(RawValue::into_string).collect())
}
