pub mod attempt_service;
pub mod catalog_service;
pub mod grading_service;
pub mod seed_service;
pub mod selection_service;
pub mod snapshot_service;
pub mod sync_service;
pub mod user_service;
