use serde::{Deserialize, Serialize};

use super::bank::BankId;
use super::question::{Difficulty, Question, QuestionKind};

/// Identifier for a survey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurveyId(pub String);

impl SurveyId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurveyKind {
    Survey,
    Quiz,
    Assessment,
    Iq,
}

impl SurveyKind {
    /// Plain surveys collect opinions; they carry no answer keys and are
    /// excluded from scoring.
    pub const fn requires_answers(self) -> bool {
        !matches!(self, Self::Survey)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Survey => "Survey",
            Self::Quiz => "Quiz",
            Self::Assessment => "Assessment",
            Self::Iq => "IQ Test",
        }
    }
}

/// Where a survey's questions come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source_type", rename_all = "snake_case")]
pub enum QuestionSource {
    /// Authored directly on the survey, served verbatim in stored order.
    Manual { questions: Vec<Question> },
    /// Random sample without replacement from one bank.
    QuestionBank {
        question_bank_id: BankId,
        question_count: usize,
    },
    /// Independent per-bank samples concatenated in configuration order.
    MultiQuestionBank { config: Vec<BankSelection> },
    /// Admin-curated subset, frozen at configuration time.
    ManualSelection { selected_questions: Vec<Question> },
}

impl QuestionSource {
    pub const fn is_bank_backed(&self) -> bool {
        matches!(
            self,
            Self::QuestionBank { .. } | Self::MultiQuestionBank { .. }
        )
    }
}

/// One entry of a multi-bank configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankSelection {
    pub question_bank_id: BankId,
    pub question_count: usize,
    #[serde(default)]
    pub filters: QuestionFilters,
}

/// Optional narrowing of a bank before sampling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionFilters {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<QuestionKind>,
}

impl QuestionFilters {
    pub fn matches(&self, question: &Question) -> bool {
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| question.tags.contains(tag)) {
            return false;
        }
        if let Some(difficulty) = self.difficulty {
            if question.difficulty != Some(difficulty) {
                return false;
            }
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&question.kind) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    Percentage,
    Accumulated,
}

/// Point assignment policy for individual questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomScoringRules {
    #[serde(default)]
    pub use_custom_points: bool,
    #[serde(default = "default_question_points")]
    pub default_question_points: u32,
}

fn default_question_points() -> u32 {
    1
}

impl Default for CustomScoringRules {
    fn default() -> Self {
        Self {
            use_custom_points: false,
            default_question_points: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSettings {
    #[serde(default = "default_mode")]
    pub scoring_mode: ScoringMode,
    #[serde(default = "default_threshold")]
    pub passing_threshold: u32,
    #[serde(default)]
    pub custom_scoring_rules: CustomScoringRules,
}

fn default_mode() -> ScoringMode {
    ScoringMode::Percentage
}

fn default_threshold() -> u32 {
    60
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            scoring_mode: ScoringMode::Percentage,
            passing_threshold: 60,
            custom_scoring_rules: CustomScoringRules::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub slug: String,
    pub title: String,
    pub kind: SurveyKind,
    #[serde(flatten)]
    pub source: QuestionSource,
    #[serde(default)]
    pub scoring: ScoringSettings,
}

impl Survey {
    pub fn validate(&self) -> Result<(), SurveyError> {
        if !self.kind.requires_answers() && self.source.is_bank_backed() {
            return Err(SurveyError::BankSourceOnPlainSurvey {
                survey: self.id.clone(),
            });
        }

        let configured = match &self.source {
            QuestionSource::Manual { questions } => questions.as_slice(),
            QuestionSource::ManualSelection { selected_questions } => {
                selected_questions.as_slice()
            }
            _ => &[],
        };
        for question in configured {
            question
                .validate()
                .map_err(|source| SurveyError::InvalidQuestion {
                    survey: self.id.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// True when `key` names this survey by slug or by id.
    pub fn matches_key(&self, key: &str) -> bool {
        self.slug == key || self.id.0 == key
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("survey {survey:?} is a plain survey and cannot use question banks")]
    BankSourceOnPlainSurvey { survey: SurveyId },
    #[error("survey {survey:?} carries an invalid question: {source}")]
    InvalidQuestion {
        survey: SurveyId,
        source: super::question::QuestionError,
    },
}

/// Survey lookup abstraction so the service can be exercised in isolation.
pub trait SurveyStore: Send + Sync {
    fn survey_by_slug_or_id(&self, key: &str) -> Option<Survey>;
}
