//! Scenario coverage for the submission pipeline: gate, resolution,
//! snapshotting, scoring, and persistence driven through the public
//! service facade.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use survey_engine::surveys::{
        AnswerKey, BankId, CustomScoringRules, Question, QuestionBank, QuestionBankStore,
        QuestionId, QuestionKind, QuestionOption, RepositoryError, Response, ResponseRepository,
        ScoringMode, ScoringSettings, Survey, SurveyId, SurveyKind, SurveyStore,
    };

    #[derive(Default)]
    pub struct InMemoryCatalog {
        surveys: Mutex<Vec<Survey>>,
        banks: Mutex<HashMap<BankId, QuestionBank>>,
    }

    impl InMemoryCatalog {
        pub fn with(surveys: Vec<Survey>, banks: Vec<QuestionBank>) -> Arc<Self> {
            Arc::new(Self {
                surveys: Mutex::new(surveys),
                banks: Mutex::new(
                    banks.into_iter().map(|bank| (bank.id.clone(), bank)).collect(),
                ),
            })
        }

        pub fn replace_bank(&self, bank: QuestionBank) {
            let mut guard = self.banks.lock().expect("bank mutex poisoned");
            guard.insert(bank.id.clone(), bank);
        }

        pub fn remove_bank(&self, id: &BankId) {
            let mut guard = self.banks.lock().expect("bank mutex poisoned");
            guard.remove(id);
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

    #[derive(Default)]
    pub struct InMemoryResponses {
        records: Mutex<Vec<Response>>,
    }

    impl InMemoryResponses {
        pub fn all(&self) -> Vec<Response> {
            self.records.lock().expect("response mutex poisoned").clone()
        }
    }

    impl ResponseRepository for InMemoryResponses {
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

    pub fn single_choice(id: &str, text: &str, options: &[&str], correct: usize, points: u32) -> Question {
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
            tags: Vec::new(),
            difficulty: None,
        }
    }

    pub fn percentage_settings(threshold: u32, use_custom_points: bool) -> ScoringSettings {
        ScoringSettings {
            scoring_mode: ScoringMode::Percentage,
            passing_threshold: threshold,
            custom_scoring_rules: CustomScoringRules {
                use_custom_points,
                default_question_points: 1,
            },
        }
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{percentage_settings, single_choice, InMemoryCatalog, InMemoryResponses};
use survey_engine::surveys::{
    AnswerSheet, BankId, CustomScoringRules, DistributionMode, GateRejection,
    InMemoryInvitationGate, Invitation, QuestionBank, QuestionSource, RawAnswer, ScoringMode,
    ScoringSettings, SourceError, SubmissionError, SubmissionRequest, Survey, SurveyId,
    SurveyKind, SurveyService,
};

fn quiz_survey() -> Survey {
    Survey {
        id: SurveyId::new("s-quiz"),
        slug: "capitals".to_string(),
        title: "Capitals".to_string(),
        kind: SurveyKind::Quiz,
        source: QuestionSource::Manual {
            questions: vec![single_choice("q1", "Pick", &["A", "B", "C"], 1, 5)],
        },
        scoring: percentage_settings(60, true),
    }
}

fn service_for(
    surveys: Vec<Survey>,
    banks: Vec<QuestionBank>,
) -> (
    SurveyService<InMemoryCatalog, InMemoryResponses, InMemoryInvitationGate>,
    Arc<InMemoryCatalog>,
    Arc<InMemoryResponses>,
) {
    let catalog = InMemoryCatalog::with(surveys, banks);
    let responses = Arc::new(InMemoryResponses::default());
    let gate = InMemoryInvitationGate::default();
    let service = SurveyService::new(catalog.clone(), responses.clone(), Arc::new(gate));
    (service, catalog, responses)
}

fn keyed(entries: &[(&str, RawAnswer)]) -> AnswerSheet {
    AnswerSheet::Keyed(
        entries
            .iter()
            .map(|(id, answer)| (id.to_string(), Some(answer.clone())))
            .collect(),
    )
}

/// Keyed sheet with explicit unanswered entries, as a client submits for a
/// sampled question set it only partially filled in.
fn keyed_with_blanks(entries: &[(&str, Option<RawAnswer>)]) -> AnswerSheet {
    AnswerSheet::Keyed(
        entries
            .iter()
            .map(|(id, answer)| (id.to_string(), answer.clone()))
            .collect(),
    )
}

fn request(name: &str, answers: AnswerSheet) -> SubmissionRequest {
    SubmissionRequest {
        name: name.to_string(),
        email: format!("{name}@example.com"),
        answers,
        time_spent: 42,
        is_auto_submit: false,
        invitation_code: None,
        answer_durations: BTreeMap::new(),
    }
}

#[test]
fn correct_answer_scores_full_marks() {
    let (service, _, _) = service_for(vec![quiz_survey()], Vec::new());

    let response = service
        .submit(
            "capitals",
            request("alice", keyed(&[("q1", RawAnswer::Text("B".to_string()))])),
        )
        .expect("submission succeeds");

    let score = response.score.expect("quiz is scored");
    assert_eq!(score.total_points, 5);
    assert_eq!(score.max_possible_points, 5);
    assert_eq!(score.display_score, 100);
    assert!(score.passed);
}

#[test]
fn wrong_answer_scores_zero_and_fails() {
    let (service, _, _) = service_for(vec![quiz_survey()], Vec::new());

    let response = service
        .submit(
            "capitals",
            request("bob", keyed(&[("q1", RawAnswer::Text("A".to_string()))])),
        )
        .expect("submission succeeds");

    let score = response.score.expect("quiz is scored");
    assert_eq!(score.total_points, 0);
    assert_eq!(score.display_score, 0);
    assert!(!score.passed);
}

#[test]
fn plain_survey_skips_scoring() {
    let mut survey = quiz_survey();
    survey.kind = SurveyKind::Survey;
    survey.source = QuestionSource::Manual {
        questions: vec![{
            let mut q = single_choice("q1", "Favorite?", &["A", "B", "C"], 0, 1);
            q.answer_key = None;
            q
        }],
    };
    let (service, _, _) = service_for(vec![survey], Vec::new());

    let response = service
        .submit(
            "capitals",
            request("carol", keyed(&[("q1", RawAnswer::Text("C".to_string()))])),
        )
        .expect("submission succeeds");

    assert!(response.score.is_none());
    assert_eq!(response.question_snapshots.len(), 1);
}

#[test]
fn snapshots_survive_bank_edits_and_deletion() {
    let bank = QuestionBank {
        id: BankId::new("bank-1"),
        name: "Bank".to_string(),
        questions: vec![single_choice("q1", "Original text", &["A", "B"], 0, 1)],
    };
    let survey = Survey {
        id: SurveyId::new("s-bank"),
        slug: "banked".to_string(),
        title: "Banked".to_string(),
        kind: SurveyKind::Quiz,
        source: QuestionSource::QuestionBank {
            question_bank_id: BankId::new("bank-1"),
            question_count: 1,
        },
        scoring: percentage_settings(60, false),
    };
    let (service, catalog, responses) = service_for(vec![survey], vec![bank]);

    service
        .submit(
            "banked",
            request("dave", keyed(&[("q1", RawAnswer::Text("A".to_string()))])),
        )
        .expect("submission succeeds");

    // Rewrite, then delete, the bank the response was sampled from.
    catalog.replace_bank(QuestionBank {
        id: BankId::new("bank-1"),
        name: "Bank".to_string(),
        questions: vec![single_choice("q1", "Rewritten text", &["X", "Y"], 1, 9)],
    });
    catalog.remove_bank(&BankId::new("bank-1"));

    let stored = &responses.all()[0];
    let snapshot = &stored.question_snapshots[0];
    assert_eq!(snapshot.question_data.text, "Original text");
    assert_eq!(snapshot.question_data.options[0].text, "A");
    assert!(snapshot.scoring.is_correct);
    assert!(stored.score.as_ref().expect("scored").passed);
}

#[test]
fn bank_submission_fails_closed_on_unknown_question_id() {
    let bank = QuestionBank {
        id: BankId::new("bank-1"),
        name: "Bank".to_string(),
        questions: vec![single_choice("q1", "Known", &["A", "B"], 0, 1)],
    };
    let survey = Survey {
        id: SurveyId::new("s-bank"),
        slug: "banked".to_string(),
        title: "Banked".to_string(),
        kind: SurveyKind::Quiz,
        source: QuestionSource::QuestionBank {
            question_bank_id: BankId::new("bank-1"),
            question_count: 1,
        },
        scoring: percentage_settings(60, false),
    };
    let (service, _, responses) = service_for(vec![survey], vec![bank]);

    let error = service
        .submit(
            "banked",
            request(
                "eve",
                keyed(&[("deleted-question", RawAnswer::Text("A".to_string()))]),
            ),
        )
        .expect_err("unknown id fails closed");

    assert!(matches!(
        error,
        SubmissionError::Source(SourceError::QuestionUnavailable { .. })
    ));
    assert!(responses.all().is_empty());
}

#[test]
fn unanswered_served_questions_still_count_against_the_score() {
    let bank = QuestionBank {
        id: BankId::new("bank-1"),
        name: "Bank".to_string(),
        questions: vec![
            single_choice("q1", "First", &["A", "B"], 0, 1),
            single_choice("q2", "Second", &["A", "B"], 0, 1),
            single_choice("q3", "Third", &["A", "B"], 0, 1),
        ],
    };
    let survey = Survey {
        id: SurveyId::new("s-bank"),
        slug: "banked".to_string(),
        title: "Banked".to_string(),
        kind: SurveyKind::Quiz,
        source: QuestionSource::QuestionBank {
            question_bank_id: BankId::new("bank-1"),
            question_count: 3,
        },
        scoring: percentage_settings(60, false),
    };
    let (service, _, _) = service_for(vec![survey], vec![bank]);

    // One real answer, two left blank; the blanks must stay in the
    // denominator instead of shrinking the graded set to one question.
    let response = service
        .submit(
            "banked",
            request(
                "heidi",
                keyed_with_blanks(&[
                    ("q1", Some(RawAnswer::Text("A".to_string()))),
                    ("q2", None),
                    ("q3", None),
                ]),
            ),
        )
        .expect("submission succeeds");

    assert_eq!(response.question_snapshots.len(), 3);
    let score = response.score.expect("quiz is scored");
    assert_eq!(score.total_points, 1);
    assert_eq!(score.max_possible_points, 3);
    assert_eq!(score.display_score, 33);
    assert!(!score.passed);
    assert_eq!(score.wrong_answers, 2);
}

#[test]
fn partial_bank_answer_sheets_are_rejected() {
    let bank = QuestionBank {
        id: BankId::new("bank-1"),
        name: "Bank".to_string(),
        questions: vec![
            single_choice("q1", "First", &["A", "B"], 0, 1),
            single_choice("q2", "Second", &["A", "B"], 0, 1),
            single_choice("q3", "Third", &["A", "B"], 0, 1),
        ],
    };
    let survey = Survey {
        id: SurveyId::new("s-bank"),
        slug: "banked".to_string(),
        title: "Banked".to_string(),
        kind: SurveyKind::Quiz,
        source: QuestionSource::QuestionBank {
            question_bank_id: BankId::new("bank-1"),
            question_count: 3,
        },
        scoring: percentage_settings(60, false),
    };
    let (service, _, responses) = service_for(vec![survey], vec![bank]);

    let error = service
        .submit(
            "banked",
            request("ivan", keyed(&[("q1", RawAnswer::Text("A".to_string()))])),
        )
        .expect_err("sheet covering one of three served questions rejected");

    assert!(matches!(error, SubmissionError::Validation(_)));
    assert!(responses.all().is_empty());
}

#[test]
fn bank_submission_requires_keyed_answers() {
    let bank = QuestionBank {
        id: BankId::new("bank-1"),
        name: "Bank".to_string(),
        questions: vec![single_choice("q1", "Known", &["A", "B"], 0, 1)],
    };
    let survey = Survey {
        id: SurveyId::new("s-bank"),
        slug: "banked".to_string(),
        title: "Banked".to_string(),
        kind: SurveyKind::Quiz,
        source: QuestionSource::QuestionBank {
            question_bank_id: BankId::new("bank-1"),
            question_count: 1,
        },
        scoring: percentage_settings(60, false),
    };
    let (service, _, _) = service_for(vec![survey], vec![bank]);

    let error = service
        .submit(
            "banked",
            request(
                "frank",
                AnswerSheet::Ordered(vec![Some(RawAnswer::Text("A".to_string()))]),
            ),
        )
        .expect_err("ordered answers rejected for bank sources");
    assert!(matches!(error, SubmissionError::Validation(_)));
}

#[test]
fn accumulated_mode_scores_custom_points() {
    let survey = Survey {
        id: SurveyId::new("s-acc"),
        slug: "weighted".to_string(),
        title: "Weighted".to_string(),
        kind: SurveyKind::Assessment,
        source: QuestionSource::Manual {
            questions: vec![
                single_choice("q1", "First", &["A", "B"], 0, 2),
                single_choice("q2", "Second", &["A", "B"], 0, 3),
                single_choice("q3", "Third", &["A", "B"], 0, 5),
            ],
        },
        scoring: ScoringSettings {
            scoring_mode: ScoringMode::Accumulated,
            passing_threshold: 6,
            custom_scoring_rules: CustomScoringRules {
                use_custom_points: true,
                default_question_points: 1,
            },
        },
    };
    let (service, _, _) = service_for(vec![survey], Vec::new());

    // Correct on the first and third questions only.
    let response = service
        .submit(
            "weighted",
            request(
                "grace",
                keyed(&[
                    ("q1", RawAnswer::Text("A".to_string())),
                    ("q2", RawAnswer::Text("B".to_string())),
                    ("q3", RawAnswer::Text("A".to_string())),
                ]),
            ),
        )
        .expect("submission succeeds");

    let score = response.score.expect("assessment is scored");
    assert_eq!(score.total_points, 7);
    assert_eq!(score.max_possible_points, 10);
    assert_eq!(score.display_score, 7);
    assert!(score.passed);
}

#[test]
fn rejected_invitation_never_builds_a_snapshot() {
    let mut invitation = Invitation::new(
        "invite-1",
        SurveyId::new("s-quiz"),
        DistributionMode::Targeted,
    );
    invitation.target_emails = vec!["invited@example.com".to_string()];
    let gate = InMemoryInvitationGate::with_invitations(vec![invitation]);
    let catalog = InMemoryCatalog::with(vec![quiz_survey()], Vec::new());
    let responses = Arc::new(InMemoryResponses::default());
    let service = SurveyService::new(catalog, responses.clone(), Arc::new(gate));

    let mut req = request("mallory", keyed(&[("q1", RawAnswer::Text("B".to_string()))]));
    req.invitation_code = Some("invite-1".to_string());

    let error = service
        .submit("capitals", req)
        .expect_err("uninvited respondent rejected");
    assert!(matches!(
        error,
        SubmissionError::Authorization(GateRejection::NotTargeted)
    ));
    assert!(responses.all().is_empty());
}

#[test]
fn invitation_for_a_different_survey_is_rejected() {
    let invitation = Invitation::new(
        "invite-1",
        SurveyId::new("some-other-survey"),
        DistributionMode::Link,
    );
    let gate = InMemoryInvitationGate::with_invitations(vec![invitation]);
    let catalog = InMemoryCatalog::with(vec![quiz_survey()], Vec::new());
    let responses = Arc::new(InMemoryResponses::default());
    let service = SurveyService::new(catalog, responses.clone(), Arc::new(gate));

    let mut req = request("oscar", keyed(&[("q1", RawAnswer::Text("B".to_string()))]));
    req.invitation_code = Some("invite-1".to_string());

    let error = service
        .submit("capitals", req)
        .expect_err("code issued for another survey rejected");
    assert!(matches!(
        error,
        SubmissionError::Authorization(GateRejection::NotFound)
    ));
    assert!(responses.all().is_empty());
}

#[test]
fn single_use_invitation_rejects_the_second_submission() {
    let mut invitation = Invitation::new("invite-1", SurveyId::new("s-quiz"), DistributionMode::Link);
    invitation.max_responses = Some(1);
    let gate = InMemoryInvitationGate::with_invitations(vec![invitation]);
    let catalog = InMemoryCatalog::with(vec![quiz_survey()], Vec::new());
    let responses = Arc::new(InMemoryResponses::default());
    let service = SurveyService::new(catalog, responses.clone(), Arc::new(gate));

    let mut first = request("alice", keyed(&[("q1", RawAnswer::Text("B".to_string()))]));
    first.invitation_code = Some("invite-1".to_string());
    service.submit("capitals", first).expect("first submission succeeds");

    let mut second = request("bob", keyed(&[("q1", RawAnswer::Text("B".to_string()))]));
    second.invitation_code = Some("invite-1".to_string());
    let error = service
        .submit("capitals", second)
        .expect_err("second submission rejected");

    assert!(matches!(
        error,
        SubmissionError::Authorization(GateRejection::QuotaExceeded)
    ));
    assert_eq!(responses.all().len(), 1);
}

#[test]
fn missing_required_fields_are_rejected_before_persistence() {
    let (service, _, responses) = service_for(vec![quiz_survey()], Vec::new());

    let mut req = request("alice", keyed(&[("q1", RawAnswer::Text("B".to_string()))]));
    req.name = "  ".to_string();
    let error = service.submit("capitals", req).expect_err("blank name rejected");
    assert!(matches!(error, SubmissionError::Validation(_)));
    assert!(responses.all().is_empty());
}

#[test]
fn unknown_survey_is_not_found() {
    let (service, _, _) = service_for(vec![quiz_survey()], Vec::new());
    let error = service
        .submit(
            "nope",
            request("alice", keyed(&[("q1", RawAnswer::Text("B".to_string()))])),
        )
        .expect_err("unknown survey");
    assert!(matches!(error, SubmissionError::SurveyNotFound(_)));
}

#[test]
fn answer_durations_land_in_snapshots() {
    let (service, _, _) = service_for(vec![quiz_survey()], Vec::new());

    let mut req = request("alice", keyed(&[("q1", RawAnswer::Text("B".to_string()))]));
    req.answer_durations.insert("q1".to_string(), 17);

    let response = service.submit("capitals", req).expect("submission succeeds");
    assert_eq!(
        response.question_snapshots[0].duration_in_seconds,
        Some(17)
    );
}
