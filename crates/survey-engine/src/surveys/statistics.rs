//! Survey-wide statistics, computed from stored snapshots only. The live
//! question bank is never consulted, so statistics stay stable after bank
//! edits, and responses that saw different sampled questions simply
//! contribute to different groups.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::RawAnswer;
use super::response::{Response, ResponseId};
use super::scoring::ResponseScore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionFilter {
    #[default]
    All,
    /// Submitted by the respondent before the time limit.
    Completed,
    /// Submitted automatically at time-limit expiry.
    AutoSubmitted,
}

impl CompletionFilter {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Some(Self::All),
            "completed" => Some(Self::Completed),
            "auto" | "auto_submitted" => Some(Self::AutoSubmitted),
            _ => None,
        }
    }

    fn matches(self, response: &Response) -> bool {
        match self {
            Self::All => true,
            Self::Completed => !response.is_auto_submit,
            Self::AutoSubmitted => response.is_auto_submit,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticsFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub status: CompletionFilter,
}

impl StatisticsFilter {
    fn matches(&self, response: &Response) -> bool {
        if let Some(name) = &self.name {
            if !response.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if let Some(email) = &self.email {
            if !response.email.to_lowercase().contains(&email.to_lowercase()) {
                return false;
            }
        }
        if let Some(from) = self.from_date {
            if response.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to_date {
            if response.created_at > to {
                return false;
            }
        }
        self.status.matches(response)
    }
}

/// Deterministic page slice over the sorted response list.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
        }
    }
}

/// Answer distribution for one distinct question text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question: String,
    /// Selection counts per option text, seeded with zero for every option
    /// the snapshot carried.
    pub options: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub total_responses: usize,
    /// Completions over invitation access-log entries, as a percentage.
    /// 100 when no invitation tracking exists.
    pub completion_rate: f64,
    pub total_questions: usize,
}

/// One row of the admin response listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponseView {
    pub id: ResponseId,
    pub name: String,
    pub email: String,
    /// Question text mapped to the formatted answer.
    pub answers: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub time_spent: u32,
    pub is_auto_submit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ResponseScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyStatistics {
    pub summary: StatisticsSummary,
    pub aggregated_stats: Vec<QuestionStats>,
    pub user_responses: Vec<UserResponseView>,
}

/// Compile statistics from stored responses.
///
/// Responses are grouped by each snapshot's own question text rather than a
/// live question id: under bank sourcing, different responses may hold
/// different questions at the same position, and each contributes to its
/// own group.
pub fn compile_statistics(
    responses: &[Response],
    filter: &StatisticsFilter,
    access_count: usize,
    page: &PageRequest,
) -> SurveyStatistics {
    let matching: Vec<&Response> = responses
        .iter()
        .filter(|response| filter.matches(response))
        .collect();

    let mut stats: Vec<QuestionStats> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for response in &matching {
        for snapshot in &response.question_snapshots {
            let key = snapshot.question_data.text.clone();
            let index = *group_index.entry(key.clone()).or_insert_with(|| {
                let mut options = BTreeMap::new();
                for option in &snapshot.question_data.options {
                    options.insert(option.text.clone(), 0);
                }
                stats.push(QuestionStats {
                    question: key,
                    options,
                });
                stats.len() - 1
            });

            let group = &mut stats[index];
            // A group first seen via one response may lack options another
            // snapshot carries; seed them lazily so counting never drops.
            for option in &snapshot.question_data.options {
                group.options.entry(option.text.clone()).or_insert(0);
            }
            if let Some(answer) = &snapshot.user_answer {
                for selection in answer.selections() {
                    if let Some(count) = group.options.get_mut(selection) {
                        *count += 1;
                    }
                }
            }
        }
    }

    let total_responses = matching.len();
    // Responses that arrived outside the invitation flow can outnumber the
    // access-log entries, so the rate is capped at 100.
    let completion_rate = if access_count > 0 {
        let rate = ((total_responses as f64 / access_count as f64) * 100.0).min(100.0);
        (rate * 100.0).round() / 100.0
    } else {
        100.0
    };

    let mut sorted = matching;
    // Documents accumulate with no inherent order; sort explicitly before
    // slicing so pagination is stable.
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

    let page_number = page.page.max(1);
    let start = (page_number - 1).saturating_mul(page.page_size);
    let user_responses = sorted
        .iter()
        .skip(start)
        .take(page.page_size)
        .map(|response| response_view(response))
        .collect();

    SurveyStatistics {
        summary: StatisticsSummary {
            total_responses,
            completion_rate,
            total_questions: stats.len(),
        },
        aggregated_stats: stats,
        user_responses,
    }
}

fn response_view(response: &Response) -> UserResponseView {
    let mut answers = BTreeMap::new();
    for snapshot in &response.question_snapshots {
        let formatted = match &snapshot.user_answer {
            None => "No answer".to_string(),
            Some(RawAnswer::Text(value)) => value.clone(),
            Some(RawAnswer::Selection(values)) => values.join(", "),
        };
        answers.insert(snapshot.question_data.text.clone(), formatted);
    }

    UserResponseView {
        id: response.id.clone(),
        name: response.name.clone(),
        email: response.email.clone(),
        answers,
        created_at: response.created_at,
        time_spent: response.time_spent,
        is_auto_submit: response.is_auto_submit,
        score: response.score.clone(),
    }
}
