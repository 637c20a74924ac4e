use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::group::Group;
use crate::models::module::{Module, ModuleSettings, ModuleSubjectConfig};
use crate::models::question::Question;
use crate::models::subject::Subject;
use crate::models::test_result::TestResult;
use crate::models::user::User;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i64,
    pub full_name: String,
    pub username: String,
    pub workplace: String,
    pub role: String,
    pub group_id: Option<i64>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            username: user.username.clone(),
            workplace: user.workplace.clone(),
            role: user.role().as_str().to_string(),
            group_id: user.group_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: i64,
    pub name: String,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub module_ids: Vec<i64>,
}

impl GroupView {
    pub fn new(group: &Group, module_ids: Vec<i64>) -> Self {
        Self {
            id: group.id,
            name: group.name.clone(),
            is_archived: group.is_archived,
            created_at: group.created_at,
            module_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectView {
    pub id: i64,
    pub name: String,
    pub is_demo: bool,
}

impl From<&Subject> for SubjectView {
    fn from(subject: &Subject) -> Self {
        Self {
            id: subject.id,
            name: subject.name.clone(),
            is_demo: subject.is_demo,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConfigView {
    pub id: i64,
    pub subject_id: i64,
    pub question_count: i32,
}

impl From<&ModuleSubjectConfig> for SubjectConfigView {
    fn from(config: &ModuleSubjectConfig) -> Self {
        Self {
            id: config.id,
            subject_id: config.subject_id,
            question_count: config.question_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleView {
    pub id: i64,
    pub name: String,
    pub is_demo: bool,
    pub group_ids: Vec<i64>,
    pub subject_configs: Vec<SubjectConfigView>,
    pub settings: ModuleSettings,
}

impl ModuleView {
    pub fn new(module: &Module, group_ids: Vec<i64>, configs: &[ModuleSubjectConfig]) -> Self {
        Self {
            id: module.id,
            name: module.name.clone(),
            is_demo: module.is_demo,
            group_ids,
            subject_configs: configs.iter().map(SubjectConfigView::from).collect(),
            settings: module.settings(),
        }
    }
}

/// Full question including the answer key. Never used on the test-taking path.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: i64,
    pub subject_id: i64,
    pub text: String,
    pub options: Vec<String>,
    pub correct_index: i32,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            subject_id: question.subject_id,
            text: question.text.clone(),
            options: question.options(),
            correct_index: question.correct_index,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
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

impl From<&TestResult> for ResultView {
    fn from(result: &TestResult) -> Self {
        Self {
            id: result.id,
            participant_id: result.participant_id,
            module_id: result.module_id,
            group_id: result.group_id,
            correct_answers: result.correct_answers,
            total_questions: result.total_questions,
            score: result.score,
            is_passed: result.is_passed,
            date: result.date,
            time_taken: result.time_taken,
        }
    }
}

/// Read-side projection of the entity graph, split into live and demo partitions.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub users: Vec<UserView>,
    pub groups: Vec<GroupView>,
    pub subjects: Vec<SubjectView>,
    pub modules: Vec<ModuleView>,
    pub questions: Vec<QuestionView>,
    pub results: Vec<ResultView>,
    pub demo_subjects: Vec<SubjectView>,
    pub demo_modules: Vec<ModuleView>,
    pub demo_questions: Vec<QuestionView>,
    pub demo_results: Vec<ResultView>,
}
