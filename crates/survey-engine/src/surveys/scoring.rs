//! Question-level grading and response-level aggregation.
//!
//! Both functions are pure and total: malformed or missing answers grade as
//! incorrect, never as errors, so the engine can run over any well-typed
//! input without a database or network in reach.
//!
//! Short text comparison trims surrounding whitespace and is case
//! sensitive; the same rule applies in live grading and previews.
//! A single-choice key accepts a scalar text answer only: list answers are
//! graded incorrect, even when the list holds one element. Scalar answers
//! against a multiple-choice key coerce to a one-element selection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::question::{AnswerKey, Question, RawAnswer};
use super::survey::{CustomScoringRules, ScoringMode, ScoringSettings};

/// Per-question grading outcome, embedded in every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub is_correct: bool,
    pub points_awarded: u32,
    pub max_points: u32,
}

/// Response-level score rolled up from per-question results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseScore {
    pub total_points: u32,
    pub max_possible_points: u32,
    pub correct_answers: usize,
    pub wrong_answers: usize,
    /// Percentage (0-100) in percentage mode, raw points in accumulated mode.
    pub display_score: u32,
    pub passed: bool,
    pub scoring_mode: ScoringMode,
}

/// Grade one answer against a question's key.
pub fn score_answer(
    question: &Question,
    answer: Option<&RawAnswer>,
    rules: &CustomScoringRules,
) -> QuestionScore {
    let max_points = max_points(question, rules);
    let is_correct = match (&question.answer_key, answer) {
        (Some(key), Some(answer)) => answer_matches(question, key, answer),
        _ => false,
    };

    QuestionScore {
        is_correct,
        points_awarded: if is_correct { max_points } else { 0 },
        max_points,
    }
}

fn max_points(question: &Question, rules: &CustomScoringRules) -> u32 {
    if rules.use_custom_points && question.points > 0 {
        question.points
    } else if rules.default_question_points > 0 {
        rules.default_question_points
    } else {
        1
    }
}

fn answer_matches(question: &Question, key: &AnswerKey, answer: &RawAnswer) -> bool {
    match key {
        AnswerKey::SingleChoice(expected) => match answer {
            RawAnswer::Text(text) => question.option_index(text) == Some(*expected),
            RawAnswer::Selection(_) => false,
        },
        AnswerKey::MultipleChoice(expected) => {
            // Unmatched texts are dropped and duplicates collapse; the
            // remaining index set must equal the key set exactly.
            let selected: BTreeSet<usize> = answer
                .selections()
                .iter()
                .filter_map(|text| question.option_index(text))
                .collect();
            let expected: BTreeSet<usize> = expected.iter().copied().collect();
            selected == expected
        }
        AnswerKey::ShortText(expected) => match answer {
            RawAnswer::Text(text) => text.trim() == expected.trim(),
            RawAnswer::Selection(_) => false,
        },
    }
}

/// Roll per-question results into a single response score.
pub fn aggregate_score(results: &[QuestionScore], settings: &ScoringSettings) -> ResponseScore {
    let total_points: u32 = results.iter().map(|r| r.points_awarded).sum();
    let max_possible_points: u32 = results.iter().map(|r| r.max_points).sum();
    let correct_answers = results.iter().filter(|r| r.is_correct).count();
    let wrong_answers = results.len() - correct_answers;

    let (display_score, passed) = match settings.scoring_mode {
        ScoringMode::Percentage => {
            // Guard the zero-question case so the score is 0, never NaN.
            let percentage = if max_possible_points == 0 {
                0
            } else {
                ((total_points as f64 / max_possible_points as f64) * 100.0).round() as u32
            };
            (percentage, percentage >= settings.passing_threshold)
        }
        ScoringMode::Accumulated => (total_points, total_points >= settings.passing_threshold),
    };

    ResponseScore {
        total_points,
        max_possible_points,
        correct_answers,
        wrong_answers,
        display_score,
        passed,
        scoring_mode: settings.scoring_mode,
    }
}
