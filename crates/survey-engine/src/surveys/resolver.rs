use rand::seq::SliceRandom;
use tracing::warn;

use super::bank::{BankId, QuestionBankStore};
use super::question::{Question, QuestionId};
use super::survey::{QuestionSource, Survey};

/// Resolution failures surface instead of silently shrinking the question
/// set; a deleted bank must be visible to operators, not papered over.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("question bank {0:?} is unavailable")]
    BankUnavailable(BankId),
    #[error("question {question:?} no longer exists in the survey's source")]
    QuestionUnavailable { question: QuestionId },
}

/// Produce the ordered question list one respondent will answer.
///
/// Bank-backed sources sample uniformly without replacement, so two
/// respondents are not guaranteed the same subset or order. When a bank
/// holds fewer questions than requested, every available question is
/// returned (best effort).
pub fn resolve(
    survey: &Survey,
    banks: &dyn QuestionBankStore,
) -> Result<Vec<Question>, SourceError> {
    match &survey.source {
        QuestionSource::Manual { questions } => Ok(questions.clone()),
        QuestionSource::ManualSelection { selected_questions } => Ok(selected_questions.clone()),
        QuestionSource::QuestionBank {
            question_bank_id,
            question_count,
        } => {
            let bank = banks.bank(question_bank_id).ok_or_else(|| {
                warn!(bank = %question_bank_id.0, survey = %survey.id.0, "question bank missing at resolution");
                SourceError::BankUnavailable(question_bank_id.clone())
            })?;
            Ok(sample(bank.questions, *question_count))
        }
        QuestionSource::MultiQuestionBank { config } => {
            let mut resolved = Vec::new();
            for entry in config {
                let bank = banks.bank(&entry.question_bank_id).ok_or_else(|| {
                    warn!(bank = %entry.question_bank_id.0, survey = %survey.id.0, "question bank missing at resolution");
                    SourceError::BankUnavailable(entry.question_bank_id.clone())
                })?;
                let pool = bank.filtered(&entry.filters);
                resolved.extend(sample(pool, entry.question_count));
            }
            Ok(resolved)
        }
    }
}

fn sample(mut pool: Vec<Question>, count: usize) -> Vec<Question> {
    if pool.len() <= count {
        return pool;
    }
    let mut rng = rand::thread_rng();
    let (sampled, _) = pool.partial_shuffle(&mut rng, count);
    sampled.to_vec()
}
