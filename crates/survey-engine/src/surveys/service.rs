use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::bank::QuestionBankStore;
use super::invitation::{GateRejection, InvitationGate, RespondentIdentity};
use super::question::{PublicQuestion, Question, RawAnswer};
use super::resolver::{self, SourceError};
use super::response::{RepositoryError, Response, ResponseId, ResponseRepository};
use super::scoring::aggregate_score;
use super::snapshot::build_snapshot;
use super::statistics::{compile_statistics, PageRequest, StatisticsFilter, SurveyStatistics};
use super::survey::{QuestionSource, Survey, SurveyStore};

/// Answers as submitted: keyed by question id, or positional against a
/// manual question list. Bank-sourced surveys must key by id because the
/// served subset differs per respondent, and must carry an entry for every
/// served question (`null` for the ones left blank) so skipped questions
/// still count against the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerSheet {
    Keyed(BTreeMap<String, Option<RawAnswer>>),
    Ordered(Vec<Option<RawAnswer>>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRequest {
    pub name: String,
    pub email: String,
    pub answers: AnswerSheet,
    #[serde(default)]
    pub time_spent: u32,
    #[serde(default)]
    pub is_auto_submit: bool,
    #[serde(default)]
    pub invitation_code: Option<String>,
    /// Seconds spent per question id.
    #[serde(default)]
    pub answer_durations: BTreeMap<String, u32>,
}

/// Error raised by the submission service.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("survey {0} not found")]
    SurveyNotFound(String),
    #[error("invalid submission: {0}")]
    Validation(String),
    #[error(transparent)]
    Authorization(#[from] GateRejection),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

static RESPONSE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_response_id() -> ResponseId {
    let id = RESPONSE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ResponseId(format!("resp-{id:06}"))
}

/// Facade composing the invitation gate, source resolver, snapshot builder,
/// scoring engine, and response repository.
pub struct SurveyService<C, R, G> {
    catalog: Arc<C>,
    responses: Arc<R>,
    gate: Arc<G>,
    default_page_size: usize,
}

impl<C, R, G> SurveyService<C, R, G>
where
    C: SurveyStore + QuestionBankStore + 'static,
    R: ResponseRepository + 'static,
    G: InvitationGate + 'static,
{
    pub fn new(catalog: Arc<C>, responses: Arc<R>, gate: Arc<G>) -> Self {
        Self {
            catalog,
            responses,
            gate,
            default_page_size: PageRequest::default().page_size,
        }
    }

    /// Page size used when the statistics query does not name one.
    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size.max(1);
        self
    }

    pub fn default_page_size(&self) -> usize {
        self.default_page_size
    }

    /// Resolve the question list one respondent will see, with answer keys
    /// stripped. Bank-backed surveys sample afresh on every call.
    pub fn questions(&self, survey_key: &str) -> Result<Vec<PublicQuestion>, SubmissionError> {
        let survey = self.survey(survey_key)?;
        let questions = resolver::resolve(&survey, self.catalog.as_ref())?;
        Ok(questions.iter().map(Question::public_view).collect())
    }

    /// Grade and persist one submission.
    ///
    /// Order matters: the gate authorizes before any question is resolved,
    /// so a rejected submission never builds a snapshot; the invitation
    /// slot is claimed atomically before the response is stored, so the
    /// quota can never be exceeded.
    pub fn submit(
        &self,
        survey_key: &str,
        request: SubmissionRequest,
    ) -> Result<Response, SubmissionError> {
        if request.name.trim().is_empty() {
            return Err(SubmissionError::Validation("name is required".to_string()));
        }
        if request.email.trim().is_empty() {
            return Err(SubmissionError::Validation("email is required".to_string()));
        }

        let survey = self.survey(survey_key)?;
        let identity = RespondentIdentity::from_email(request.email.clone());

        if let Some(code) = &request.invitation_code {
            self.gate.authorize(code, &survey.id, &identity)?;
        }

        let served = self.served_questions(&survey, &request.answers)?;
        let aligned = aligned_answers(&served, &request.answers);

        let snapshots: Vec<_> = served
            .iter()
            .zip(&aligned)
            .enumerate()
            .map(|(index, (question, answer))| {
                build_snapshot(
                    index,
                    question,
                    answer.as_ref(),
                    request.answer_durations.get(&question.id.0).copied(),
                    &survey.scoring.custom_scoring_rules,
                )
            })
            .collect();

        let score = survey.kind.requires_answers().then(|| {
            let results: Vec<_> = snapshots.iter().map(|s| s.scoring).collect();
            aggregate_score(&results, &survey.scoring)
        });

        if let Some(code) = &request.invitation_code {
            self.gate.mark_completed(code, Some(&survey.id), &identity)?;
        }

        let mut answers = BTreeMap::new();
        for (question, answer) in served.iter().zip(&aligned) {
            if let Some(answer) = answer {
                answers.insert(question.id.0.clone(), answer.clone());
            }
        }

        let response = Response {
            id: next_response_id(),
            survey_id: survey.id.clone(),
            name: request.name,
            email: request.email,
            answers,
            question_snapshots: snapshots,
            score,
            time_spent: request.time_spent,
            is_auto_submit: request.is_auto_submit,
            created_at: Utc::now(),
        };

        let stored = self.responses.insert(response)?;
        info!(
            survey = %survey.id.0,
            response = %stored.id.0,
            auto_submit = stored.is_auto_submit,
            "response recorded"
        );
        Ok(stored)
    }

    /// Statistics over stored snapshots for one survey.
    pub fn statistics(
        &self,
        survey_key: &str,
        filter: &StatisticsFilter,
        page: &PageRequest,
    ) -> Result<SurveyStatistics, SubmissionError> {
        let survey = self.survey(survey_key)?;
        let responses = self.responses.for_survey(&survey.id)?;
        let access_count = self.gate.access_count(&survey.id);
        Ok(compile_statistics(&responses, filter, access_count, page))
    }

    /// Gate callback for external submission paths. The caller only holds
    /// an invitation code, so no survey binding is enforced here.
    pub fn complete_invitation(
        &self,
        code: &str,
        identity: &RespondentIdentity,
    ) -> Result<(), GateRejection> {
        self.gate.mark_completed(code, None, identity)
    }

    fn survey(&self, survey_key: &str) -> Result<Survey, SubmissionError> {
        let survey = self
            .catalog
            .survey_by_slug_or_id(survey_key)
            .ok_or_else(|| SubmissionError::SurveyNotFound(survey_key.to_string()))?;
        // A misconfigured survey is the operator's bug, but it must not
        // produce a half-scored response.
        survey
            .validate()
            .map_err(|error| SubmissionError::Validation(error.to_string()))?;
        Ok(survey)
    }

    /// The questions this submission was served, in a stable order.
    ///
    /// Manual sources serve the configured list. Bank sources reconstruct
    /// the served subset from the submitted ids against the bank pool; an
    /// id the pool no longer contains fails the submission closed, and the
    /// sheet must cover the full served set (unanswered entries submitted
    /// as `null`) so skipped questions cannot drop out of the score
    /// denominator.
    fn served_questions(
        &self,
        survey: &Survey,
        answers: &AnswerSheet,
    ) -> Result<Vec<Question>, SubmissionError> {
        match &survey.source {
            QuestionSource::Manual { questions } => Ok(questions.clone()),
            QuestionSource::ManualSelection { selected_questions } => {
                Ok(selected_questions.clone())
            }
            QuestionSource::QuestionBank { .. } | QuestionSource::MultiQuestionBank { .. } => {
                let AnswerSheet::Keyed(map) = answers else {
                    return Err(SubmissionError::Validation(
                        "bank-sourced surveys require answers keyed by question id".to_string(),
                    ));
                };

                let (pool, expected) = self.bank_pool(survey)?;
                let served: Vec<Question> = pool
                    .into_iter()
                    .filter(|question| map.contains_key(&question.id.0))
                    .collect();

                for id in map.keys() {
                    if !served.iter().any(|question| question.id.0 == *id) {
                        return Err(SourceError::QuestionUnavailable {
                            question: super::question::QuestionId::new(id.clone()),
                        }
                        .into());
                    }
                }
                if served.len() != expected {
                    return Err(SubmissionError::Validation(format!(
                        "answer sheet covers {} of {} served questions",
                        served.len(),
                        expected
                    )));
                }
                Ok(served)
            }
        }
    }

    /// The full candidate pool plus the number of questions one respondent
    /// is served from it.
    fn bank_pool(&self, survey: &Survey) -> Result<(Vec<Question>, usize), SubmissionError> {
        match &survey.source {
            QuestionSource::QuestionBank {
                question_bank_id,
                question_count,
            } => {
                let bank = self
                    .catalog
                    .bank(question_bank_id)
                    .ok_or_else(|| SourceError::BankUnavailable(question_bank_id.clone()))?;
                let expected = (*question_count).min(bank.questions.len());
                Ok((bank.questions, expected))
            }
            QuestionSource::MultiQuestionBank { config } => {
                let mut pool = Vec::new();
                let mut expected = 0;
                for entry in config {
                    let bank = self.catalog.bank(&entry.question_bank_id).ok_or_else(|| {
                        SourceError::BankUnavailable(entry.question_bank_id.clone())
                    })?;
                    let matching = bank.filtered(&entry.filters);
                    expected += entry.question_count.min(matching.len());
                    pool.extend(matching);
                }
                Ok((pool, expected))
            }
            _ => Ok((Vec::new(), 0)),
        }
    }
}

fn aligned_answers(questions: &[Question], answers: &AnswerSheet) -> Vec<Option<RawAnswer>> {
    match answers {
        AnswerSheet::Keyed(map) => questions
            .iter()
            .map(|question| map.get(&question.id.0).cloned().flatten())
            .collect(),
        AnswerSheet::Ordered(list) => {
            let mut aligned: Vec<Option<RawAnswer>> =
                list.iter().take(questions.len()).cloned().collect();
            aligned.resize(questions.len(), None);
            aligned
        }
    }
}
