use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use survey_engine::surveys::{
    AnswerKey, BankId, BankSelection, CustomScoringRules, Difficulty, DistributionMode,
    Invitation, Question, QuestionBank, QuestionBankStore, QuestionFilters, QuestionId,
    QuestionKind, QuestionOption, QuestionSource, RepositoryError, Response, ResponseRepository,
    ScoringMode, ScoringSettings, Survey, SurveyId, SurveyKind, SurveyStore,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Surveys and question banks held in process memory. Production deploys
/// swap this for a database-backed catalog behind the same traits.
#[derive(Default)]
pub(crate) struct InMemoryCatalog {
    surveys: Mutex<Vec<Survey>>,
    banks: Mutex<HashMap<BankId, QuestionBank>>,
}

impl InMemoryCatalog {
    pub(crate) fn with(surveys: Vec<Survey>, banks: Vec<QuestionBank>) -> Self {
        Self {
            surveys: Mutex::new(surveys),
            banks: Mutex::new(banks.into_iter().map(|bank| (bank.id.clone(), bank)).collect()),
        }
    }
}

impl SurveyStore for InMemoryCatalog {
    fn survey_by_slug_or_id(&self, key: &str) -> Option<Survey> {
        let guard = self.surveys.lock().expect("survey mutex poisoned");
        guard.iter().find(|survey| survey.matches_key(key)).cloned()
    }
}

impl QuestionBankStore for InMemoryCatalog {
    fn bank(&self, id: &BankId) -> Option<QuestionBank> {
        let guard = self.banks.lock().expect("bank mutex poisoned");
        guard.get(id).cloned()
    }
}

/// Append-only response store.
#[derive(Default)]
pub(crate) struct InMemoryResponseRepository {
    records: Mutex<Vec<Response>>,
}

impl ResponseRepository for InMemoryResponseRepository {
    fn insert(&self, response: Response) -> Result<Response, RepositoryError> {
        let mut guard = self.records.lock().expect("response mutex poisoned");
        if guard.iter().any(|stored| stored.id == response.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(response.clone());
        Ok(response)
    }

    fn for_survey(&self, survey_id: &SurveyId) -> Result<Vec<Response>, RepositoryError> {
        let guard = self.records.lock().expect("response mutex poisoned");
        Ok(guard
            .iter()
            .filter(|response| response.survey_id == *survey_id)
            .cloned()
            .collect())
    }
}

fn single_choice(
    id: &str,
    text: &str,
    options: &[&str],
    correct: usize,
    points: u32,
    tags: &[&str],
    difficulty: Difficulty,
) -> Question {
    Question {
        id: QuestionId::new(id),
        text: text.to_string(),
        kind: QuestionKind::SingleChoice,
        options: options.iter().map(|o| QuestionOption::new(*o)).collect(),
        answer_key: Some(AnswerKey::SingleChoice(correct)),
        points,
        explanation: None,
        image_url: None,
        description_image: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        difficulty: Some(difficulty),
    }
}

pub(crate) fn seed_banks() -> Vec<QuestionBank> {
    vec![
        QuestionBank {
            id: BankId::new("bank-geography"),
            name: "Geography".to_string(),
            questions: vec![
                single_choice(
                    "geo-1",
                    "Capital of France?",
                    &["Paris", "Lyon", "Marseille"],
                    0,
                    2,
                    &["europe"],
                    Difficulty::Easy,
                ),
                single_choice(
                    "geo-2",
                    "Capital of Japan?",
                    &["Osaka", "Tokyo", "Kyoto"],
                    1,
                    2,
                    &["asia"],
                    Difficulty::Easy,
                ),
                single_choice(
                    "geo-3",
                    "Longest river in the world?",
                    &["Amazon", "Nile", "Yangtze"],
                    1,
                    3,
                    &["rivers"],
                    Difficulty::Medium,
                ),
                single_choice(
                    "geo-4",
                    "Highest mountain on Earth?",
                    &["K2", "Kangchenjunga", "Everest"],
                    2,
                    3,
                    &["mountains"],
                    Difficulty::Medium,
                ),
            ],
        },
        QuestionBank {
            id: BankId::new("bank-math"),
            name: "Mathematics".to_string(),
            questions: vec![
                single_choice(
                    "math-1",
                    "What is 7 x 8?",
                    &["54", "56", "64"],
                    1,
                    2,
                    &["arithmetic"],
                    Difficulty::Easy,
                ),
                single_choice(
                    "math-2",
                    "Square root of 144?",
                    &["10", "11", "12"],
                    2,
                    3,
                    &["arithmetic"],
                    Difficulty::Medium,
                ),
                single_choice(
                    "math-3",
                    "Derivative of x^2?",
                    &["x", "2x", "x^2"],
                    1,
                    5,
                    &["calculus"],
                    Difficulty::Hard,
                ),
            ],
        },
    ]
}

pub(crate) fn seed_surveys() -> Vec<Survey> {
    vec![
        Survey {
            id: SurveyId::new("survey-capitals"),
            slug: "capitals-quiz".to_string(),
            title: "Capitals Quiz".to_string(),
            kind: SurveyKind::Quiz,
            source: QuestionSource::QuestionBank {
                question_bank_id: BankId::new("bank-geography"),
                question_count: 3,
            },
            scoring: ScoringSettings {
                scoring_mode: ScoringMode::Percentage,
                passing_threshold: 60,
                custom_scoring_rules: CustomScoringRules {
                    use_custom_points: true,
                    default_question_points: 1,
                },
            },
        },
        Survey {
            id: SurveyId::new("survey-mixed"),
            slug: "mixed-assessment".to_string(),
            title: "Mixed Assessment".to_string(),
            kind: SurveyKind::Assessment,
            source: QuestionSource::MultiQuestionBank {
                config: vec![
                    BankSelection {
                        question_bank_id: BankId::new("bank-geography"),
                        question_count: 2,
                        filters: QuestionFilters::default(),
                    },
                    BankSelection {
                        question_bank_id: BankId::new("bank-math"),
                        question_count: 2,
                        filters: QuestionFilters {
                            difficulty: Some(Difficulty::Medium),
                            ..QuestionFilters::default()
                        },
                    },
                ],
            },
            scoring: ScoringSettings {
                scoring_mode: ScoringMode::Accumulated,
                passing_threshold: 5,
                custom_scoring_rules: CustomScoringRules {
                    use_custom_points: true,
                    default_question_points: 1,
                },
            },
        },
    ]
}

pub(crate) fn seed_invitations() -> Vec<Invitation> {
    let mut invitation = Invitation::new(
        "demo-invite",
        SurveyId::new("survey-capitals"),
        DistributionMode::Link,
    );
    invitation.max_responses = Some(100);
    vec![invitation]
}
