//! Question bank and recommendation lookup.
//!
//! Both are read-only collaborators of the engine. [`ContentLibrary`] is the
//! bundled implementation, backed by a TOML document:
//!
//! ```toml
//! [[assessments]]
//! id = "stage1"
//! locale = "en"
//!
//! [[assessments.questions]]
//! id = "s1q1"
//! options = [{ value = "a" }, { value = "b" }]
//! correct = ["a"]
//!
//! [[recommendations]]
//! key = "level:beginner"
//! locale = "en"
//! items = ["..."]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::question::{Constitution, Question};
use crate::error::ContentError;
use crate::scoring::Level;

/// Locale used when the requested one has no content.
pub const FALLBACK_LOCALE: &str = "en";

const BUILTIN_LIBRARY: &str = include_str!("builtin.toml");

/// Ordered questions per assessment and locale.
pub trait QuestionBank {
    /// Questions for `assessment_id`, in presentation order. Empty when the
    /// assessment is unknown.
    fn questions(&self, assessment_id: &str, locale: &str) -> &[Question];
}

/// Recommendation tables keyed by category or level.
pub trait RecommendationLookup {
    fn recommendations(&self, key: RecommendationKey, locale: &str) -> Vec<String>;
}

/// Everything the orchestrator reads from content.
pub trait Content: QuestionBank + RecommendationLookup {}

impl<T: QuestionBank + RecommendationLookup> Content for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationKey {
    Constitution(Constitution),
    Level(Level),
}

impl RecommendationKey {
    /// Key as written in content files, e.g. `constitution:damp_heat`.
    pub fn as_key(&self) -> String {
        match self {
            RecommendationKey::Constitution(c) => format!("constitution:{}", c.key()),
            RecommendationKey::Level(l) => format!("level:{}", l.key()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    assessments: Vec<AssessmentEntry>,
    #[serde(default)]
    recommendations: Vec<RecommendationEntry>,
}

#[derive(Debug, Deserialize)]
struct AssessmentEntry {
    id: String,
    #[serde(default = "default_locale")]
    locale: String,
    #[serde(default)]
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct RecommendationEntry {
    key: String,
    #[serde(default = "default_locale")]
    locale: String,
    #[serde(default)]
    items: Vec<String>,
}

fn default_locale() -> String {
    FALLBACK_LOCALE.to_string()
}

/// In-memory question bank and recommendation tables.
#[derive(Debug, Clone, Default)]
pub struct ContentLibrary {
    assessments: HashMap<(String, String), Vec<Question>>,
    recommendations: HashMap<(String, String), Vec<String>>,
}

impl ContentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// The library bundled with the crate.
    ///
    /// # Errors
    /// Returns an error only if the bundled document is malformed.
    pub fn builtin() -> Result<Self, ContentError> {
        Self::from_toml(BUILTIN_LIBRARY)
    }

    /// Parse a library document.
    ///
    /// # Errors
    /// Returns an error if the TOML is invalid or an assessment has no
    /// questions.
    pub fn from_toml(source: &str) -> Result<Self, ContentError> {
        let file: LibraryFile = toml::from_str(source)?;
        let mut library = Self::new();
        for entry in file.assessments {
            if entry.questions.is_empty() {
                return Err(ContentError::EmptyAssessment(entry.id));
            }
            library.insert_questions(entry.id, entry.locale, entry.questions);
        }
        for entry in file.recommendations {
            library
                .recommendations
                .insert((entry.key, entry.locale), entry.items);
        }
        Ok(library)
    }

    /// Load a library document from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let source = std::fs::read_to_string(path).map_err(|source| ContentError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source)
    }

    pub fn insert_questions(
        &mut self,
        assessment_id: impl Into<String>,
        locale: impl Into<String>,
        questions: Vec<Question>,
    ) {
        self.assessments
            .insert((assessment_id.into(), locale.into()), questions);
    }

    pub fn insert_recommendations(
        &mut self,
        key: RecommendationKey,
        locale: impl Into<String>,
        items: Vec<String>,
    ) {
        self.recommendations
            .insert((key.as_key(), locale.into()), items);
    }

    fn lookup<'a, T>(
        map: &'a HashMap<(String, String), T>,
        id: &str,
        locale: &str,
    ) -> Option<&'a T> {
        map.get(&(id.to_string(), locale.to_string())).or_else(|| {
            if locale == FALLBACK_LOCALE {
                None
            } else {
                map.get(&(id.to_string(), FALLBACK_LOCALE.to_string()))
            }
        })
    }
}

impl QuestionBank for ContentLibrary {
    fn questions(&self, assessment_id: &str, locale: &str) -> &[Question] {
        Self::lookup(&self.assessments, assessment_id, locale)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl RecommendationLookup for ContentLibrary {
    fn recommendations(&self, key: RecommendationKey, locale: &str) -> Vec<String> {
        Self::lookup(&self.recommendations, &key.as_key(), locale)
            .cloned()
            .unwrap_or_default()
    }
}
