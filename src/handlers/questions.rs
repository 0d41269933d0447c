// src/handlers/questions.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::question::{CreateQuestionRequest, PageParams, UpdateQuestionRequest},
    services::{attempt, catalog},
    state::AppState,
    utils::jwt::Caller,
};

/// The caller's paginated question view.
///
/// * Admins: the whole pool in default order, with answer flags.
/// * Everyone else: starts or resumes the attempt and returns its frozen view.
pub async fn list_questions(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(quiz_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = attempt::questions_for_caller(&state, caller, quiz_id, params).await?;
    Ok(Json(page))
}

/// Admin: add a question and its options in one write.
pub async fn create_question(
    State(state): State<AppState>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = catalog::create_question(&state, quiz_id, payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn get_question(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((quiz_id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let question = catalog::get_question(&state, caller, quiz_id, question_id).await?;
    Ok(Json(question))
}

/// Admin: update content and/or replace the option set.
pub async fn update_question(
    State(state): State<AppState>,
    Path((quiz_id, question_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = catalog::update_question(&state, quiz_id, question_id, payload).await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(state): State<AppState>,
    Path((quiz_id, question_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    catalog::delete_question(&state, quiz_id, question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
