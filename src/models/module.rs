use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_POINTS_PER_ANSWER: i32 = 5;
pub const DEFAULT_DURATION_MINUTES: i32 = 30;
pub const DEFAULT_PASSING_SCORE: i32 = 60;

/// A timed test definition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Module {
    pub id: i64,
    pub name: String,
    pub is_demo: bool,
    pub points_per_answer: i32,
    pub duration_minutes: i32,
    pub passing_score: i32,
    pub randomize: bool,
    pub is_active: bool,
}

impl Module {
    pub fn settings(&self) -> ModuleSettings {
        ModuleSettings {
            points_per_answer: self.points_per_answer,
            duration_minutes: self.duration_minutes,
            passing_score: self.passing_score,
            randomize: self.randomize,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSettings {
    pub points_per_answer: i32,
    pub duration_minutes: i32,
    pub passing_score: i32,
    pub randomize: bool,
    pub is_active: bool,
}

impl Default for ModuleSettings {
    fn default() -> Self {
        Self {
            points_per_answer: DEFAULT_POINTS_PER_ANSWER,
            duration_minutes: DEFAULT_DURATION_MINUTES,
            passing_score: DEFAULT_PASSING_SCORE,
            randomize: true,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleDraft {
    pub name: String,
    pub is_demo: bool,
    pub settings: ModuleSettings,
}

/// Per-subject quota of a module. Owned by the module and replaced wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ModuleSubjectConfig {
    pub id: i64,
    pub module_id: i64,
    pub subject_id: i64,
    pub question_count: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct ModuleGroupLink {
    pub module_id: i64,
    pub group_id: i64,
}
