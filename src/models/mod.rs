pub mod group;
pub mod module;
pub mod question;
pub mod subject;
pub mod test_result;
pub mod user;
