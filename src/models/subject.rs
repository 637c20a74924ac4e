use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Question category. Demo and live subjects form separate universes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub is_demo: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SubjectDraft {
    pub name: String,
    pub is_demo: bool,
}
