use async_trait::async_trait;

use crate::error::Result;
use crate::models::group::{Group, GroupDraft};
use crate::models::module::{Module, ModuleDraft, ModuleGroupLink, ModuleSubjectConfig};
use crate::models::question::{Question, QuestionDraft};
use crate::models::subject::{Subject, SubjectDraft};
use crate::models::test_result::{TestResult, TestResultDraft};
use crate::models::user::{User, UserDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Group,
    Subject,
    Module,
    Question,
    User,
    TestResult,
}

impl EntityKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Group => "groups",
            EntityKind::Subject => "subjects",
            EntityKind::Module => "modules",
            EntityKind::Question => "questions",
            EntityKind::User => "users",
            EntityKind::TestResult => "test_results",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuestionFilter {
    pub is_demo: Option<bool>,
    pub subject_id: Option<i64>,
    pub subject_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct ResultFilter {
    pub participant_id: Option<i64>,
    pub is_demo: Option<bool>,
}

/// Persistence boundary for the assessment entity graph.
///
/// Lists come back newest first (highest id, or latest date for results). Deleting a row
/// applies the storage cascade rules: subjects take their questions and subject-configs,
/// modules take their subject-configs, group links and results, users take their results,
/// groups detach users and results and drop their module links.
#[async_trait]
pub trait EntityStore: Send {
    async fn exists(&mut self, kind: EntityKind, id: i64) -> Result<bool>;
    async fn delete(&mut self, kind: EntityKind, id: i64) -> Result<bool>;
    /// Deletes every row of `kind` whose id is not in `keep`. Returns the number removed.
    async fn delete_except(&mut self, kind: EntityKind, keep: &[i64]) -> Result<u64>;

    async fn find_group(&mut self, id: i64) -> Result<Option<Group>>;
    async fn insert_group(&mut self, draft: &GroupDraft) -> Result<Group>;
    async fn update_group(&mut self, id: i64, draft: &GroupDraft) -> Result<Group>;
    async fn list_groups(&mut self, ids: Option<&[i64]>) -> Result<Vec<Group>>;
    async fn set_group_modules(&mut self, group_id: i64, module_ids: &[i64]) -> Result<()>;

    async fn find_subject(&mut self, id: i64) -> Result<Option<Subject>>;
    async fn insert_subject(&mut self, draft: &SubjectDraft) -> Result<Subject>;
    async fn update_subject(&mut self, id: i64, draft: &SubjectDraft) -> Result<Subject>;
    async fn list_subjects(&mut self, is_demo: Option<bool>) -> Result<Vec<Subject>>;

    async fn find_module(&mut self, id: i64) -> Result<Option<Module>>;
    async fn insert_module(&mut self, draft: &ModuleDraft) -> Result<Module>;
    async fn update_module(&mut self, id: i64, draft: &ModuleDraft) -> Result<Module>;
    async fn list_modules(&mut self, is_demo: Option<bool>) -> Result<Vec<Module>>;
    async fn set_module_groups(&mut self, module_id: i64, group_ids: &[i64]) -> Result<()>;
    async fn module_group_links(&mut self) -> Result<Vec<ModuleGroupLink>>;
    async fn module_group_ids(&mut self, module_id: i64) -> Result<Vec<i64>>;
    /// Configs of one module in configuration order.
    async fn subject_configs(&mut self, module_id: i64) -> Result<Vec<ModuleSubjectConfig>>;
    async fn all_subject_configs(&mut self) -> Result<Vec<ModuleSubjectConfig>>;
    /// Drops the module's configs and recreates them from `(subject_id, question_count)`.
    async fn replace_subject_configs(&mut self, module_id: i64, configs: &[(i64, i32)]) -> Result<()>;

    async fn find_question(&mut self, id: i64) -> Result<Option<Question>>;
    async fn insert_question(&mut self, draft: &QuestionDraft) -> Result<Question>;
    async fn update_question(&mut self, id: i64, draft: &QuestionDraft) -> Result<Question>;
    async fn list_questions(&mut self, filter: &QuestionFilter) -> Result<Vec<Question>>;
    /// Pool of one subject ordered by ascending id.
    async fn questions_for_subject(&mut self, subject_id: i64) -> Result<Vec<Question>>;
    /// Questions whose id is in `ids` and whose subject is in `subject_ids`.
    async fn questions_in_subjects(&mut self, ids: &[i64], subject_ids: &[i64]) -> Result<Vec<Question>>;

    async fn find_user(&mut self, id: i64) -> Result<Option<User>>;
    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>>;
    async fn insert_user(&mut self, draft: &UserDraft, password_hash: Option<&str>) -> Result<User>;
    /// Updates profile fields; the stored hash changes only when `password_hash` is given.
    async fn update_user(&mut self, id: i64, draft: &UserDraft, password_hash: Option<&str>) -> Result<User>;
    async fn list_users(&mut self, ids: Option<&[i64]>) -> Result<Vec<User>>;
    /// Serializes concurrent writers acting on behalf of one participant.
    async fn lock_user(&mut self, id: i64) -> Result<()>;

    async fn find_result(&mut self, id: i64) -> Result<Option<TestResult>>;
    async fn insert_result(&mut self, draft: &TestResultDraft) -> Result<TestResult>;
    async fn update_result(&mut self, id: i64, draft: &TestResultDraft) -> Result<TestResult>;
    async fn list_results(&mut self, filter: &ResultFilter) -> Result<Vec<TestResult>>;
    async fn count_attempts(&mut self, participant_id: i64, module_id: i64) -> Result<i64>;
}
