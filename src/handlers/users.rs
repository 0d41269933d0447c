// src/handlers/users.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        quiz::ListParams,
        user::{AdminCreateUserRequest, NewUser, UpdateUserRequest, UserChanges, role_for},
    },
    state::AppState,
    utils::{hash::hash_password, jwt::Caller},
};

/// Updates the current user's own account.
///
/// A non-admin asking for `is_admin` keeps their current role.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = state
        .store()
        .get_user(caller.id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let role = match payload.is_admin {
        Some(flag) if current.is_admin() => Some(role_for(flag).to_string()),
        _ => None,
    };
    let password = payload.password.as_deref().map(hash_password).transpose()?;

    let changes = UserChanges {
        username: payload.username,
        password,
        role,
        is_active: payload.is_active,
    };
    let user = state
        .store()
        .update_user(current.id, &changes)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    tracing::info!("User {} updated their account", user.id);
    Ok(Json(user))
}

/// Lists all users. Admin only.
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let users = state.store().list_users(params.skip(), params.limit()).await?;
    Ok(Json(users))
}

/// Creates a user with an explicit role. Admin only.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = state
        .store()
        .create_user(NewUser {
            username: payload.username,
            password: hash_password(&payload.password)?,
            role: role_for(payload.is_admin).to_string(),
        })
        .await?;
    tracing::info!(
        "Admin {} created user {} ({}) with role {}",
        caller.id,
        user.username,
        user.id,
        user.role
    );

    Ok((StatusCode::CREATED, Json(user)))
}
