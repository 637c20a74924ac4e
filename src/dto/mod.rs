pub mod auth_dto;
pub mod catalog_dto;
pub mod snapshot_dto;
pub mod sync_dto;
pub mod test_dto;
