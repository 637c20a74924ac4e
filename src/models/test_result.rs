use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One completed attempt of a module.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct TestResult {
    pub id: i64,
    pub participant_id: i64,
    pub module_id: i64,
    pub group_id: Option<i64>,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub score: i32,
    pub is_passed: bool,
    pub date: DateTime<Utc>,
    pub time_taken: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct TestResultDraft {
    pub participant_id: i64,
    pub module_id: i64,
    pub group_id: Option<i64>,
    pub correct_answers: i32,
    pub total_questions: i32,
    pub score: i32,
    pub is_passed: bool,
    pub time_taken: Option<i32>,
}
