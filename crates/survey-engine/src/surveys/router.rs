use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::bank::QuestionBankStore;
use super::invitation::{GateRejection, InvitationGate, RespondentIdentity};
use super::response::ResponseRepository;
use super::service::{SubmissionError, SubmissionRequest, SurveyService};
use super::statistics::{CompletionFilter, PageRequest, StatisticsFilter};
use super::survey::SurveyStore;

/// Router exposing the survey scoring surface: question resolution,
/// response submission, admin statistics, and invitation completion.
pub fn survey_router<C, R, G>(service: Arc<SurveyService<C, R, G>>) -> Router
where
    C: SurveyStore + QuestionBankStore + 'static,
    R: ResponseRepository + 'static,
    G: InvitationGate + 'static,
{
    Router::new()
        .route(
            "/survey/:survey_key/questions",
            get(questions_handler::<C, R, G>),
        )
        .route(
            "/surveys/:survey_key/responses",
            post(submit_handler::<C, R, G>),
        )
        .route(
            "/admin/surveys/:survey_key/statistics",
            get(statistics_handler::<C, R, G>),
        )
        .route(
            "/invitations/complete/:invitation_code",
            post(complete_handler::<C, R, G>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionListQuery {
    #[serde(default)]
    pub(crate) email: Option<String>,
    /// Opaque attempt marker echoed by clients retaking a quiz.
    #[serde(default)]
    pub(crate) attempt: Option<u32>,
}

pub(crate) async fn questions_handler<C, R, G>(
    State(service): State<Arc<SurveyService<C, R, G>>>,
    Path(survey_key): Path<String>,
    Query(query): Query<QuestionListQuery>,
) -> Response
where
    C: SurveyStore + QuestionBankStore + 'static,
    R: ResponseRepository + 'static,
    G: InvitationGate + 'static,
{
    match service.questions(&survey_key) {
        Ok(questions) => {
            info!(
                survey = %survey_key,
                respondent = query.email.as_deref().unwrap_or("anonymous"),
                attempt = query.attempt.unwrap_or(1),
                served = questions.len(),
                "question set served"
            );
            (
                StatusCode::OK,
                Json(json!({ "survey": survey_key, "questions": questions })),
            )
                .into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<C, R, G>(
    State(service): State<Arc<SurveyService<C, R, G>>>,
    Path(survey_key): Path<String>,
    Json(request): Json<SubmissionRequest>,
) -> Response
where
    C: SurveyStore + QuestionBankStore + 'static,
    R: ResponseRepository + 'static,
    G: InvitationGate + 'static,
{
    match service.submit(&survey_key, request) {
        Ok(response) => (StatusCode::CREATED, Json(response.view())).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatisticsQuery {
    #[serde(default)]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) from_date: Option<String>,
    #[serde(default)]
    pub(crate) to_date: Option<String>,
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) page: Option<usize>,
    #[serde(default)]
    pub(crate) page_size: Option<usize>,
}

pub(crate) async fn statistics_handler<C, R, G>(
    State(service): State<Arc<SurveyService<C, R, G>>>,
    Path(survey_key): Path<String>,
    Query(query): Query<StatisticsQuery>,
) -> Response
where
    C: SurveyStore + QuestionBankStore + 'static,
    R: ResponseRepository + 'static,
    G: InvitationGate + 'static,
{
    let status = match &query.status {
        Some(raw) => match CompletionFilter::parse(raw) {
            Some(status) => status,
            None => {
                return validation_response(format!("unknown status filter '{raw}'"));
            }
        },
        None => CompletionFilter::All,
    };

    let from_date = match parse_day_bound(query.from_date.as_deref(), false) {
        Ok(bound) => bound,
        Err(message) => return validation_response(message),
    };
    let to_date = match parse_day_bound(query.to_date.as_deref(), true) {
        Ok(bound) => bound,
        Err(message) => return validation_response(message),
    };

    let filter = StatisticsFilter {
        name: query.name,
        email: query.email,
        from_date,
        to_date,
        status,
    };
    let page = PageRequest {
        page: query.page.unwrap_or(1).max(1),
        page_size: query.page_size.unwrap_or_else(|| service.default_page_size()),
    };

    match service.statistics(&survey_key, &filter, &page) {
        Ok(statistics) => (StatusCode::OK, Json(statistics)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompleteRequest {
    #[serde(default)]
    pub(crate) user_id: Option<String>,
    #[serde(default)]
    pub(crate) email: Option<String>,
}

pub(crate) async fn complete_handler<C, R, G>(
    State(service): State<Arc<SurveyService<C, R, G>>>,
    Path(invitation_code): Path<String>,
    Json(request): Json<CompleteRequest>,
) -> Response
where
    C: SurveyStore + QuestionBankStore + 'static,
    R: ResponseRepository + 'static,
    G: InvitationGate + 'static,
{
    let identity = RespondentIdentity {
        user_id: request.user_id,
        email: request.email,
    };
    match service.complete_invitation(&invitation_code, &identity) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "completed" }))).into_response(),
        Err(rejection) => {
            let status = rejection_status(&rejection);
            (status, Json(json!({ "error": rejection.to_string() }))).into_response()
        }
    }
}

/// Parse a `YYYY-MM-DD` filter into an inclusive day boundary.
fn parse_day_bound(
    raw: Option<&str>,
    end_of_day: bool,
) -> Result<Option<chrono::DateTime<Utc>>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59).expect("valid time of day")
    } else {
        date.and_hms_opt(0, 0, 0).expect("valid time of day")
    };
    Ok(Some(Utc.from_utc_datetime(&time)))
}

fn validation_response(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn error_response(error: SubmissionError) -> Response {
    let status = match &error {
        SubmissionError::SurveyNotFound(_) => StatusCode::NOT_FOUND,
        SubmissionError::Validation(_) => StatusCode::BAD_REQUEST,
        SubmissionError::Authorization(rejection) => rejection_status(rejection),
        // Fail closed: a vanished bank or question is surfaced, never
        // silently degraded into a smaller question set.
        SubmissionError::Source(_) => StatusCode::CONFLICT,
        SubmissionError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn rejection_status(rejection: &GateRejection) -> StatusCode {
    match rejection {
        GateRejection::NotFound => StatusCode::NOT_FOUND,
        GateRejection::Expired | GateRejection::NotTargeted => StatusCode::FORBIDDEN,
        GateRejection::QuotaExceeded | GateRejection::AlreadyCompleted => StatusCode::CONFLICT,
    }
}
