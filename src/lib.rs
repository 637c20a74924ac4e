pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    attempt_service::AttemptService, catalog_service::CatalogService,
    snapshot_service::SnapshotService, sync_service::SyncService, user_service::UserService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub sync_service: SyncService,
    pub attempt_service: AttemptService,
    pub snapshot_service: SnapshotService,
    pub catalog_service: CatalogService,
    pub user_service: UserService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let sync_service = SyncService::new(pool.clone(), config.sync_default_password.clone());
        let attempt_service = AttemptService::new(pool.clone());
        let snapshot_service = SnapshotService::new(pool.clone());
        let catalog_service = CatalogService::new(pool.clone());
        let user_service = UserService::new(pool.clone());

        Self {
            pool,
            sync_service,
            attempt_service,
            snapshot_service,
            catalog_service,
            user_service,
        }
    }
}
