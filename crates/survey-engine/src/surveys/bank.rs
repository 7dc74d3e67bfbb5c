use serde::{Deserialize, Serialize};

use super::question::Question;
use super::survey::QuestionFilters;

/// Identifier for a question bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BankId(pub String);

impl BankId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

/// A reusable pool of questions. Banks are mutable over time, which is
/// exactly why responses snapshot questions instead of referencing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub id: BankId,
    pub name: String,
    pub questions: Vec<Question>,
}

impl QuestionBank {
    /// Questions passing `filters`, in stored order.
    pub fn filtered(&self, filters: &QuestionFilters) -> Vec<Question> {
        self.questions
            .iter()
            .filter(|question| filters.matches(question))
            .cloned()
            .collect()
    }
}

/// Bank lookup abstraction. Implementations return owned copies so callers
/// never hold references into live storage.
pub trait QuestionBankStore: Send + Sync {
    fn bank(&self, id: &BankId) -> Option<QuestionBank>;
}
