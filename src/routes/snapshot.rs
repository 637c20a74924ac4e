use axum::{
    extract::State,
    response::{IntoResponse, Json},
    Extension,
};

use crate::{dto::sync_dto::SnapshotPayload, error::Result, middleware::auth::CurrentUser, AppState};

#[axum::debug_handler]
pub async fn get_snapshot(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.snapshot_service.snapshot(&user).await?))
}

/// Replaces the dataset with the posted snapshot and answers with the refreshed one.
#[axum::debug_handler]
pub async fn sync_snapshot(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<SnapshotPayload>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.sync_service.sync(&user, &payload).await?))
}
