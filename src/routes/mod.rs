pub mod attempts;
pub mod auth;
pub mod catalog;
pub mod health;
pub mod snapshot;
pub mod users;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::auth::{require_admin, require_bearer_auth, require_participant};
use crate::middleware::cors::permissive_cors;
use crate::AppState;

/// Full application router: `/health` plus everything under `/api`.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/token/refresh", post(auth::refresh));

    let participant = Router::new()
        .route("/tests/available", get(attempts::available_tests))
        .route("/tests/start", post(attempts::start_test))
        .route("/tests/submit", post(attempts::submit_test))
        .route_layer(from_fn(require_participant));

    let admin = Router::new()
        .route("/snapshot/sync", post(snapshot::sync_snapshot))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route("/groups", get(catalog::list_groups).post(catalog::create_group))
        .route(
            "/groups/:id",
            get(catalog::get_group)
                .put(catalog::update_group)
                .patch(catalog::update_group)
                .delete(catalog::delete_group),
        )
        .route("/subjects", get(catalog::list_subjects).post(catalog::create_subject))
        .route(
            "/subjects/:id",
            get(catalog::get_subject)
                .put(catalog::update_subject)
                .patch(catalog::update_subject)
                .delete(catalog::delete_subject),
        )
        .route("/modules", get(catalog::list_modules).post(catalog::create_module))
        .route(
            "/modules/:id",
            get(catalog::get_module)
                .put(catalog::update_module)
                .patch(catalog::update_module)
                .delete(catalog::delete_module),
        )
        .route("/questions", get(catalog::list_questions).post(catalog::create_question))
        .route(
            "/questions/:id",
            get(catalog::get_question)
                .put(catalog::update_question)
                .patch(catalog::update_question)
                .delete(catalog::delete_question),
        )
        .route_layer(from_fn(require_admin));

    let authenticated = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/snapshot", get(snapshot::get_snapshot))
        .route("/results", get(catalog::list_results))
        .route("/results/:id", get(catalog::get_result))
        .merge(participant)
        .merge(admin)
        .route_layer(from_fn_with_state(state.clone(), require_bearer_auth));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", public.merge(authenticated))
        .with_state(state)
        .layer(permissive_cors())
        .layer(TraceLayer::new_for_http())
}
