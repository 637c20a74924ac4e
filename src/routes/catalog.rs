use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use validator::Validate;

use crate::{
    database::store::QuestionFilter,
    dto::catalog_dto::{
        CatalogQuery, CreateGroupPayload, CreateModulePayload, CreateQuestionPayload,
        CreateSubjectPayload, UpdateGroupPayload, UpdateModulePayload, UpdateQuestionPayload,
        UpdateSubjectPayload,
    },
    error::Result,
    middleware::auth::CurrentUser,
    AppState,
};

#[axum::debug_handler]
pub async fn list_groups(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.list_groups().await?))
}

#[axum::debug_handler]
pub async fn get_group(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.get_group(id).await?))
}

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Json(payload): Json<CreateGroupPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let group = state.catalog_service.create_group(payload).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[axum::debug_handler]
pub async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateGroupPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    Ok(Json(state.catalog_service.update_group(id, payload).await?))
}

#[axum::debug_handler]
pub async fn delete_group(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    state.catalog_service.delete_group(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_subjects(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.list_subjects(query.demo_flag()).await?))
}

#[axum::debug_handler]
pub async fn get_subject(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.get_subject(id).await?))
}

/// `?is_demo=` wins over the body flag so the demo screens can post plain payloads.
#[axum::debug_handler]
pub async fn create_subject(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
    Json(payload): Json<CreateSubjectPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let subject = state
        .catalog_service
        .create_subject(payload, query.demo_flag())
        .await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

#[axum::debug_handler]
pub async fn update_subject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSubjectPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    Ok(Json(state.catalog_service.update_subject(id, payload).await?))
}

#[axum::debug_handler]
pub async fn delete_subject(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    state.catalog_service.delete_subject(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_modules(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.list_modules(query.demo_flag()).await?))
}

#[axum::debug_handler]
pub async fn get_module(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.get_module(id).await?))
}

#[axum::debug_handler]
pub async fn create_module(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
    Json(payload): Json<CreateModulePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let module = state
        .catalog_service
        .create_module(payload, query.demo_flag())
        .await?;
    Ok((StatusCode::CREATED, Json(module)))
}

#[axum::debug_handler]
pub async fn update_module(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateModulePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    Ok(Json(state.catalog_service.update_module(id, payload).await?))
}

#[axum::debug_handler]
pub async fn delete_module(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    state.catalog_service.delete_module(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse> {
    let filter = QuestionFilter {
        is_demo: query.demo_flag(),
        subject_id: query.subject_id,
        subject_ids: None,
    };
    Ok(Json(state.catalog_service.list_questions(filter).await?))
}

#[axum::debug_handler]
pub async fn get_question(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.get_question(id).await?))
}

#[axum::debug_handler]
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state.catalog_service.create_question(payload).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

#[axum::debug_handler]
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    Ok(Json(state.catalog_service.update_question(id, payload).await?))
}

#[axum::debug_handler]
pub async fn delete_question(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse> {
    state.catalog_service.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.list_results(&user).await?))
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.catalog_service.get_result(&user, id).await?))
}
