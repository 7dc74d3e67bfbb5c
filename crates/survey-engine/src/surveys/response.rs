use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::RawAnswer;
use super::scoring::ResponseScore;
use super::snapshot::QuestionSnapshot;
use super::survey::SurveyId;

/// Identifier for a stored response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResponseId(pub String);

/// A submitted response. Created exactly once and immutable afterward;
/// scoring settings changed later never rewrite an existing score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub survey_id: SurveyId,
    pub name: String,
    pub email: String,
    /// Raw answers keyed by question id, kept for backward compatibility.
    pub answers: BTreeMap<String, RawAnswer>,
    pub question_snapshots: Vec<QuestionSnapshot>,
    /// Absent for plain surveys, which skip scoring entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ResponseScore>,
    pub time_spent: u32,
    pub is_auto_submit: bool,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub fn view(&self) -> ResponseView {
        ResponseView {
            response_id: self.id.clone(),
            survey_id: self.survey_id.clone(),
            question_count: self.question_snapshots.len(),
            score: self.score.clone(),
            created_at: self.created_at,
        }
    }
}

/// What the submit endpoint returns to the respondent.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseView {
    pub response_id: ResponseId,
    pub survey_id: SurveyId,
    pub question_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ResponseScore>,
    pub created_at: DateTime<Utc>,
}

/// Append-only storage abstraction for responses.
pub trait ResponseRepository: Send + Sync {
    fn insert(&self, response: Response) -> Result<Response, RepositoryError>;
    fn for_survey(&self, survey_id: &SurveyId) -> Result<Vec<Response>, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("response already exists")]
    Conflict,
    #[error("response store unavailable: {0}")]
    Unavailable(String),
}
