use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use scheduler_core::CoreError;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::protocol::{
    AddAttemptRequest, CompletionResponse, CreateSessionRequest, RefreshSessionRequest,
    ResumeSessionRequest, ReviewScheduleQuery, SkipProblemRequest,
};
use crate::AppState;

/// Create the HTTP router with all REST endpoints (spec.md §6 message
/// surface, each request kind mapped to one route).
pub fn create_http_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/attempts", post(add_attempt))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/resume", post(resume_session))
        .route("/sessions", post(get_or_create_session))
        .route("/sessions/refresh", post(refresh_session))
        .route("/sessions/:id/complete", post(complete_session))
        .route("/sessions/:id/skip", post(skip_problem))
        .route("/mastery", get(get_mastery))
        .route("/problems/by-box-level", get(get_problems_by_box_level))
        .route("/review-schedule", get(get_review_schedule))
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn add_attempt(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = payload.session_id;
    let data = scheduler_core::NewAttempt {
        problem_id: payload.problem_id,
        leetcode_id: payload.leetcode_id,
        success: payload.success,
        time_spent: payload.time_spent,
        hints_used: payload.hints_used,
        comments: payload.comments,
    };

    match state.attempt_engine.add_attempt(data, session_id).await? {
        Some(outcome) => {
            if outcome.completion_hint {
                if let Some(session_id) = outcome.attempt.session_id {
                    if let Err(err) = state.lifecycle.check_and_complete_session(session_id).await
                    {
                        tracing::warn!(%err, %session_id, "post-attempt completion check failed");
                    }
                }
            }
            Ok(Json(json!({ "attempt": outcome.attempt })))
        }
        None => Err(AppError::NotFound("problem not found".to_string())),
    }
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    match state.store.get_session(id).await? {
        Some(session) => Ok(Json(json!({ "session": session }))),
        None => Err(AppError::NotFound(format!("session {id} not found"))),
    }
}

async fn resume_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResumeSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.lifecycle.resume_session(payload.session_type).await?;
    Ok(Json(json!({ "session": session })))
}

async fn get_or_create_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .lifecycle
        .get_or_create_session(payload.session_type)
        .await?;
    Ok(Json(json!({ "session": session })))
}

async fn refresh_session(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RefreshSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .lifecycle
        .refresh_session(payload.session_type, payload.force_new)
        .await?;
    Ok(Json(json!({ "session": session })))
}

async fn complete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let status = state.lifecycle.check_and_complete_session(id).await?;
    let response = match status {
        scheduler_core::CompletionStatus::NotFound => CompletionResponse::NotFound,
        scheduler_core::CompletionStatus::Completed => CompletionResponse::Completed,
        scheduler_core::CompletionStatus::Remaining(problems) => {
            CompletionResponse::Remaining { problems }
        }
    };
    Ok(Json(response))
}

async fn skip_problem(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SkipProblemRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .lifecycle
        .skip_problem(id, payload.leetcode_id, payload.replacement)
        .await?;
    Ok(Json(json!({ "message": "problem skipped" })))
}

async fn get_mastery(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let mastery = state.tag_mastery.snapshot_all().await?;
    Ok(Json(json!({ "mastery": mastery })))
}

async fn get_problems_by_box_level(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let counts = state.catalogue.count_by_box_level().await?;
    Ok(Json(json!({ "counts": counts })))
}

async fn get_review_schedule(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewScheduleQuery>,
) -> Result<impl IntoResponse, AppError> {
    let budget = query.n.unwrap_or(10);
    let session_state = state.lifecycle.current_state().await?;
    let problems = state
        .review_scheduler
        .daily_review_schedule(budget, &session_state)
        .await;
    Ok(Json(json!({ "problems": problems })))
}

/// Application error type, mapping `CoreError` kinds to HTTP statuses per
/// spec.md §7's propagation policy.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    InvalidInput(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<CoreError>() {
            Some(CoreError::NotFound(msg)) => AppError::NotFound(msg.clone()),
            Some(CoreError::TypeMismatch(msg)) => AppError::InvalidInput(msg.clone()),
            _ => AppError::Internal(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            AppError::Internal(err) => {
                let status = match err.downcast_ref::<CoreError>() {
                    Some(CoreError::StoreUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
                    Some(CoreError::TimedOut(_)) => StatusCode::GATEWAY_TIMEOUT,
                    Some(CoreError::ConflictAborted { .. }) => StatusCode::CONFLICT,
                    Some(CoreError::InvariantViolation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "internal", format!("{err}"))
            }
        };

        let body = Json(json!({ "error": { "kind": kind, "message": message } }));
        (status, body).into_response()
    }
}
