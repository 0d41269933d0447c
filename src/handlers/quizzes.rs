// src/handlers/quizzes.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::quiz::{CreateQuizRequest, ListParams, UpdateQuizRequest},
    services::catalog,
    state::AppState,
    utils::jwt::Caller,
};

/// Lists quizzes with the caller's attempt status.
///
/// Admins see the quizzes they own, everyone else the active ones.
pub async fn list_quizzes(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = catalog::list_quizzes(&state, caller, params).await?;
    Ok(Json(quizzes))
}

/// Admin: create a quiz owned by the caller.
pub async fn create_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = catalog::create_quiz(&state, caller, payload).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let detail = catalog::quiz_detail(&state, caller, quiz_id).await?;
    Ok(Json(detail))
}

/// Admin: partial update. Absent fields are left as they are.
pub async fn update_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = catalog::update_quiz(&state, quiz_id, payload).await?;
    Ok(Json(quiz))
}

/// Admin: delete a quiz with its questions and options.
pub async fn delete_quiz(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    catalog::delete_quiz(&state, quiz_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
