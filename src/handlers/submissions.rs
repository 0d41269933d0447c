// src/handlers/submissions.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::{quiz::ListParams, session::SaveSessionRequest, submission::AnswerSubmit},
    services::attempt,
    state::AppState,
    utils::jwt::Caller,
};

/// Starts a new attempt or resumes the one in progress.
pub async fn start_submission(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submission = attempt::start(&state, caller, quiz_id).await?;
    Ok(Json(submission))
}

pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(quiz_id): Path<i64>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = attempt::list_submissions(&state, caller, quiz_id, params).await?;
    Ok(Json(submissions))
}

pub async fn get_submission(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((quiz_id, submission_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let submission = attempt::get_submission(&state, caller, quiz_id, submission_id).await?;
    Ok(Json(submission))
}

/// Merges a batch of answers into the attempt.
pub async fn submit_answers(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((quiz_id, submission_id)): Path<(i64, i64)>,
    Json(answers): Json<Vec<AnswerSubmit>>,
) -> Result<impl IntoResponse, AppError> {
    let submission =
        attempt::record_answers(&state, caller, quiz_id, submission_id, answers).await?;
    Ok(Json(submission))
}

/// Grades and closes the attempt.
pub async fn finalize_submission(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((quiz_id, submission_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let result = attempt::finalize(&state, caller, quiz_id, submission_id).await?;
    Ok(Json(result))
}

pub async fn get_result(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((quiz_id, submission_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let result = attempt::result(&state, caller, quiz_id, submission_id).await?;
    Ok(Json(result))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((quiz_id, submission_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let session = attempt::load_session(&state, caller, quiz_id, submission_id).await?;
    Ok(Json(session))
}

pub async fn save_session(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((quiz_id, submission_id)): Path<(i64, i64)>,
    Json(payload): Json<SaveSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session =
        attempt::save_session(&state, caller, quiz_id, submission_id, payload.current_answers)
            .await?;
    Ok(Json(session))
}
