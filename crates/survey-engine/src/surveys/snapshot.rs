use serde::{Deserialize, Serialize};

use super::question::{Question, RawAnswer};
use super::scoring::{score_answer, QuestionScore};
use super::survey::CustomScoringRules;

/// Immutable record of one question as it was presented, together with the
/// respondent's answer and grading. Built exactly once at submission time
/// and never mutated, so later edits or deletion of the source question
/// have no effect on stored responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSnapshot {
    pub question_index: usize,
    /// Owned copy of the question, detached from any live bank.
    pub question_data: Question,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<RawAnswer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_seconds: Option<u32>,
    pub scoring: QuestionScore,
}

/// Freeze a question with its answer and grade it.
pub fn build_snapshot(
    question_index: usize,
    question: &Question,
    user_answer: Option<&RawAnswer>,
    duration_in_seconds: Option<u32>,
    rules: &CustomScoringRules,
) -> QuestionSnapshot {
    // Clone by value: the snapshot must share nothing with the source.
    let question_data = question.clone();
    let scoring = score_answer(&question_data, user_answer, rules);

    QuestionSnapshot {
        question_index,
        question_data,
        user_answer: user_answer.cloned(),
        duration_in_seconds,
        scoring,
    }
}
