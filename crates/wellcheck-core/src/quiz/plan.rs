use serde::{Deserialize, Serialize};

/// Declaration of one stage in a multi-stage quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    pub id: String,
    /// Assessment id in the question bank.
    pub assessment_id: String,
    /// Fixed question count; also the stage's maximum score.
    pub question_count: usize,
    /// Stage that must be completed before this one unlocks.
    #[serde(default)]
    pub predecessor: Option<String>,
    /// Minimum predecessor percentage. `None` or `0` means any completion.
    #[serde(default)]
    pub min_unlock_percentage: Option<u8>,
    /// Relative weight in the combined result.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl StageDefinition {
    pub fn new(id: impl Into<String>, question_count: usize) -> Self {
        let id = id.into();
        Self {
            assessment_id: id.clone(),
            id,
            question_count,
            predecessor: None,
            min_unlock_percentage: None,
            weight: 1.0,
        }
    }

    pub fn after(mut self, predecessor: impl Into<String>, min_percentage: Option<u8>) -> Self {
        self.predecessor = Some(predecessor.into());
        self.min_unlock_percentage = min_percentage;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Whether a predecessor result at `percentage` unlocks this stage.
    pub fn unlocks_at(&self, percentage: u8) -> bool {
        self.min_unlock_percentage
            .map(|min| percentage >= min)
            .unwrap_or(true)
    }
}

/// Ordered list of stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizPlan {
    stages: Vec<StageDefinition>,
}

impl QuizPlan {
    pub fn new(stages: Vec<StageDefinition>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn stage(&self, id: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Stages that declare `id` as their predecessor.
    pub fn successors<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a StageDefinition> + 'a {
        self.stages
            .iter()
            .filter(move |s| s.predecessor.as_deref() == Some(id))
    }
}

impl Default for QuizPlan {
    /// The partner-understanding quiz: four stages, later ones weigh more.
    fn default() -> Self {
        Self::new(vec![
            StageDefinition::new("stage1", 5).with_weight(3.0),
            StageDefinition::new("stage2", 10)
                .after("stage1", Some(0))
                .with_weight(7.0),
            StageDefinition::new("stage3", 5)
                .after("stage2", Some(40))
                .with_weight(10.0),
            StageDefinition::new("stage4", 5)
                .after("stage3", Some(60))
                .with_weight(10.0),
        ])
    }
}
