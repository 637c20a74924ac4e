use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::snapshot_dto::ResultView,
    dto::test_dto::{StartTestRequest, SubmitTestRequest},
    error::Result,
    middleware::auth::CurrentUser,
    AppState,
};

#[axum::debug_handler]
pub async fn available_tests(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.attempt_service.available(&user).await?))
}

#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<StartTestRequest>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.attempt_service.start(&user, &payload).await?))
}

#[axum::debug_handler]
pub async fn submit_test(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<SubmitTestRequest>,
) -> Result<impl IntoResponse> {
    let result = state.attempt_service.submit(&user, &payload).await?;
    Ok((StatusCode::CREATED, Json(ResultView::from(&result))))
}
