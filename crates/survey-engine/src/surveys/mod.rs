//! Survey domain: question model, source resolution, snapshotting, scoring,
//! aggregation, the invitation gate contract, and the HTTP router.

pub mod bank;
pub mod invitation;
pub mod question;
pub mod resolver;
pub mod response;
pub mod router;
pub mod scoring;
pub mod service;
pub mod snapshot;
pub mod statistics;
pub mod survey;

pub use bank::{BankId, QuestionBank, QuestionBankStore};
pub use invitation::{
    DistributionMode, GateRejection, InMemoryInvitationGate, Invitation, InvitationGate,
    RespondentIdentity,
};
pub use question::{
    AnswerKey, Difficulty, PublicQuestion, Question, QuestionId, QuestionKind, QuestionOption,
    RawAnswer,
};
pub use resolver::{resolve, SourceError};
pub use response::{RepositoryError, Response, ResponseId, ResponseRepository, ResponseView};
pub use router::survey_router;
pub use scoring::{aggregate_score, score_answer, QuestionScore, ResponseScore};
pub use service::{AnswerSheet, SubmissionError, SubmissionRequest, SurveyService};
pub use snapshot::{build_snapshot, QuestionSnapshot};
pub use statistics::{
    compile_statistics, CompletionFilter, PageRequest, StatisticsFilter, StatisticsSummary,
    SurveyStatistics,
};
pub use survey::{
    BankSelection, CustomScoringRules, QuestionFilters, QuestionSource, ScoringMode,
    ScoringSettings, Survey, SurveyError, SurveyId, SurveyKind, SurveyStore,
};
