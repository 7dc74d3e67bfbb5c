//! End-to-end coverage of the HTTP surface: question resolution, response
//! submission, admin statistics, and invitation completion dispatched
//! through the axum router.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use survey_engine::surveys::{
    survey_router, AnswerKey, BankId, DistributionMode, InMemoryInvitationGate, Invitation,
    Question, QuestionBank, QuestionBankStore, QuestionId, QuestionKind, QuestionOption,
    QuestionSource, RepositoryError, Response, ResponseRepository, ScoringSettings, Survey,
    SurveyId, SurveyKind, SurveyService, SurveyStore,
};

#[derive(Default)]
struct Catalog {
    surveys: Vec<Survey>,
    banks: HashMap<BankId, QuestionBank>,
}

impl SurveyStore for Catalog {
    fn survey_by_slug_or_id(&self, key: &str) -> Option<Survey> {
        self.surveys.iter().find(|survey| survey.matches_key(key)).cloned()
    }
}

impl QuestionBankStore for Catalog {
    fn bank(&self, id: &BankId) -> Option<QuestionBank> {
        self.banks.get(id).cloned()
    }
}

#[derive(Default)]
struct Responses {
    records: Mutex<Vec<Response>>,
}

impl ResponseRepository for Responses {
    fn insert(&self, response: Response) -> Result<Response, RepositoryError> {
        let mut guard = self.records.lock().expect("response mutex poisoned");
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

fn question() -> Question {
    Question {
        id: QuestionId::new("q1"),
        text: "Pick the right letter".to_string(),
        kind: QuestionKind::SingleChoice,
        options: vec![
            QuestionOption::new("A"),
            QuestionOption::new("B"),
            QuestionOption::new("C"),
        ],
        answer_key: Some(AnswerKey::SingleChoice(1)),
        points: 5,
        explanation: Some("B is correct".to_string()),
        image_url: None,
        description_image: None,
        tags: Vec::new(),
        difficulty: None,
    }
}

fn survey() -> Survey {
    Survey {
        id: SurveyId::new("s-1"),
        slug: "letters".to_string(),
        title: "Letters".to_string(),
        kind: SurveyKind::Quiz,
        source: QuestionSource::Manual {
            questions: vec![question()],
        },
        scoring: ScoringSettings::default(),
    }
}

fn build_router(invitations: Vec<Invitation>) -> axum::Router {
    let catalog = Arc::new(Catalog {
        surveys: vec![survey()],
        banks: HashMap::new(),
    });
    let responses = Arc::new(Responses::default());
    let gate = Arc::new(InMemoryInvitationGate::with_invitations(invitations));
    let service = Arc::new(SurveyService::new(catalog, responses, gate));
    survey_router(service)
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json")
}

fn submit_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/surveys/letters/responses")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
        .expect("request")
}

#[tokio::test]
async fn get_questions_strips_answer_keys() {
    let router = build_router(Vec::new());
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/survey/letters/questions?email=a@example.com&attempt=2")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    let questions = payload["questions"].as_array().expect("question list");
    assert_eq!(questions.len(), 1);
    assert!(questions[0].get("answer_key").is_none());
    assert!(questions[0].get("explanation").is_none());
    assert_eq!(questions[0]["options"].as_array().expect("options").len(), 3);
}

#[tokio::test]
async fn post_response_returns_computed_score() {
    let router = build_router(Vec::new());
    let response = router
        .oneshot(submit_request(json!({
            "name": "Alice",
            "email": "alice@example.com",
            "answers": { "q1": "B" },
            "time_spent": 30
        })))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = json_body(response).await;
    assert_eq!(payload["score"]["display_score"], json!(100));
    assert_eq!(payload["score"]["passed"], json!(true));
    assert_eq!(payload["question_count"], json!(1));
    assert!(payload.get("response_id").is_some());
}

#[tokio::test]
async fn missing_fields_are_rejected_with_400() {
    let router = build_router(Vec::new());
    let response = router
        .oneshot(submit_request(json!({
            "name": "",
            "email": "alice@example.com",
            "answers": { "q1": "B" }
        })))
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_survey_returns_404() {
    let router = build_router(Vec::new());
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/survey/unknown/questions")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn statistics_reflect_submitted_responses() {
    let router = build_router(Vec::new());

    let response = router
        .clone()
        .oneshot(submit_request(json!({
            "name": "Alice",
            "email": "alice@example.com",
            "answers": { "q1": "B" }
        })))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/admin/surveys/letters/statistics")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = json_body(response).await;
    assert_eq!(payload["summary"]["total_responses"], json!(1));
    assert_eq!(
        payload["aggregated_stats"][0]["question"],
        json!("Pick the right letter")
    );
    assert_eq!(payload["aggregated_stats"][0]["options"]["B"], json!(1));
    assert_eq!(payload["user_responses"][0]["name"], json!("Alice"));
}

#[tokio::test]
async fn statistics_reject_malformed_dates() {
    let router = build_router(Vec::new());
    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/admin/surveys/letters/statistics?from_date=yesterday")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_use_invitation_allows_exactly_one_submission() {
    let mut invitation =
        Invitation::new("inv-1", SurveyId::new("s-1"), DistributionMode::Link);
    invitation.max_responses = Some(1);
    let router = build_router(vec![invitation]);

    let first = router
        .clone()
        .oneshot(submit_request(json!({
            "name": "Alice",
            "email": "alice@example.com",
            "answers": { "q1": "B" },
            "invitation_code": "inv-1"
        })))
        .await
        .expect("router dispatch");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = router
        .oneshot(submit_request(json!({
            "name": "Bob",
            "email": "bob@example.com",
            "answers": { "q1": "B" },
            "invitation_code": "inv-1"
        })))
        .await
        .expect("router dispatch");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn invitation_for_another_survey_is_rejected_with_404() {
    let invitation =
        Invitation::new("inv-1", SurveyId::new("s-999"), DistributionMode::Link);
    let router = build_router(vec![invitation]);

    let response = router
        .oneshot(submit_request(json!({
            "name": "Alice",
            "email": "alice@example.com",
            "answers": { "q1": "B" },
            "invitation_code": "inv-1"
        })))
        .await
        .expect("router dispatch");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invitation_completion_endpoint_increments_once() {
    let mut invitation =
        Invitation::new("inv-1", SurveyId::new("s-1"), DistributionMode::Link);
    invitation.max_responses = Some(1);
    let router = build_router(vec![invitation]);

    let complete = |email: &str| {
        Request::builder()
            .method("POST")
            .uri("/invitations/complete/inv-1")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({ "email": email })).expect("serialize"),
            ))
            .expect("request")
    };

    let first = router
        .clone()
        .oneshot(complete("a@example.com"))
        .await
        .expect("router dispatch");
    assert_eq!(first.status(), StatusCode::OK);

    let second = router
        .oneshot(complete("b@example.com"))
        .await
        .expect("router dispatch");
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let payload = json_body(second).await;
    assert!(payload["error"].as_str().expect("error message").contains("quota"));
}

#[tokio::test]
async fn unknown_invitation_completion_returns_404() {
    let router = build_router(Vec::new());
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/invitations/complete/ghost")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&json!({ "email": "a@example.com" })).expect("serialize"),
                ))
                .expect("request"),
        )
        .await
        .expect("router dispatch");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
