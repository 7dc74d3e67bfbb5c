use serde::{Deserialize, Serialize};

/// Identifier for a question inside a survey or question bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(pub String);

impl QuestionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultipleChoice,
    ShortText,
}

impl QuestionKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SingleChoice => "Single Choice",
            Self::MultipleChoice => "Multiple Choice",
            Self::ShortText => "Short Text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A selectable option. Image is opaque to scoring; only `text` identifies
/// the option when grading answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl QuestionOption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: None,
        }
    }
}

/// The expected answer, tagged by question kind so each scoring branch is
/// statically exhaustive instead of sniffing a loosely typed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerKey {
    /// Index of the correct option.
    SingleChoice(usize),
    /// Unique, sorted indices of the correct options.
    MultipleChoice(Vec<usize>),
    /// Exact expected text (compared with surrounding whitespace trimmed).
    ShortText(String),
}

/// Canonical question value. Copied by value into response snapshots; never
/// shared by reference with a live question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key: Option<AnswerKey>,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
}

fn default_points() -> u32 {
    1
}

impl Question {
    /// Index of the option whose text equals `text`, if any.
    pub fn option_index(&self, text: &str) -> Option<usize> {
        self.options.iter().position(|option| option.text == text)
    }

    /// Structural consistency of the key against kind and options.
    pub fn validate(&self) -> Result<(), QuestionError> {
        match self.kind {
            QuestionKind::ShortText => {
                if !self.options.is_empty() {
                    return Err(QuestionError::UnexpectedOptions {
                        question: self.id.clone(),
                    });
                }
                if let Some(key) = &self.answer_key {
                    if !matches!(key, AnswerKey::ShortText(_)) {
                        return Err(QuestionError::KeyKindMismatch {
                            question: self.id.clone(),
                        });
                    }
                }
            }
            QuestionKind::SingleChoice => {
                if self.options.is_empty() {
                    return Err(QuestionError::MissingOptions {
                        question: self.id.clone(),
                    });
                }
                if let Some(key) = &self.answer_key {
                    let AnswerKey::SingleChoice(index) = key else {
                        return Err(QuestionError::KeyKindMismatch {
                            question: self.id.clone(),
                        });
                    };
                    if *index >= self.options.len() {
                        return Err(QuestionError::KeyOutOfRange {
                            question: self.id.clone(),
                            index: *index,
                        });
                    }
                }
            }
            QuestionKind::MultipleChoice => {
                if self.options.is_empty() {
                    return Err(QuestionError::MissingOptions {
                        question: self.id.clone(),
                    });
                }
                if let Some(key) = &self.answer_key {
                    let AnswerKey::MultipleChoice(indices) = key else {
                        return Err(QuestionError::KeyKindMismatch {
                            question: self.id.clone(),
                        });
                    };
                    if let Some(index) = indices.iter().find(|i| **i >= self.options.len()) {
                        return Err(QuestionError::KeyOutOfRange {
                            question: self.id.clone(),
                            index: *index,
                        });
                    }
                    let sorted_unique =
                        indices.windows(2).all(|pair| pair[0] < pair[1]);
                    if !sorted_unique {
                        return Err(QuestionError::KeyNotSortedUnique {
                            question: self.id.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Client-facing view with the answer key and explanation stripped.
    pub fn public_view(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id.clone(),
            text: self.text.clone(),
            kind: self.kind,
            options: self.options.clone(),
            points: self.points,
            image_url: self.image_url.clone(),
            description_image: self.description_image.clone(),
        }
    }
}

/// Question as served to respondents: no key, no explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub text: String,
    pub kind: QuestionKind,
    pub options: Vec<QuestionOption>,
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_image: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    #[error("question {question:?} is a choice question but has no options")]
    MissingOptions { question: QuestionId },
    #[error("question {question:?} is short text and must not carry options")]
    UnexpectedOptions { question: QuestionId },
    #[error("question {question:?} has an answer key of the wrong kind")]
    KeyKindMismatch { question: QuestionId },
    #[error("question {question:?} answer key index {index} is out of range")]
    KeyOutOfRange { question: QuestionId, index: usize },
    #[error("question {question:?} multiple choice key must be sorted and unique")]
    KeyNotSortedUnique { question: QuestionId },
}

/// Answer exactly as submitted by a respondent. A scalar is coerced to a
/// one-element selection when graded against a multiple choice key; the
/// reverse coercion does not apply to single choice keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAnswer {
    Text(String),
    Selection(Vec<String>),
}

impl RawAnswer {
    pub fn selections(&self) -> Vec<&str> {
        match self {
            RawAnswer::Text(value) => vec![value.as_str()],
            RawAnswer::Selection(values) => values.iter().map(String::as_str).collect(),
        }
    }
}
