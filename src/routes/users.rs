use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::catalog_dto::{CreateUserPayload, UpdateUserPayload},
    error::Result,
    AppState,
};

#[axum::debug_handler]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.user_service.list().await?))
}

#[axum::debug_handler]
pub async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    Ok(Json(state.user_service.get(id).await?))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user = state.user_service.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    Ok(Json(state.user_service.update(id, payload).await?))
}

#[axum::debug_handler]
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    state.user_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
