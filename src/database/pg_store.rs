use async_trait::async_trait;
use sqlx::PgConnection;

use crate::database::store::{EntityKind, EntityStore, QuestionFilter, ResultFilter};
use crate::error::Result;
use crate::models::group::{Group, GroupDraft};
use crate::models::module::{Module, ModuleDraft, ModuleGroupLink, ModuleSubjectConfig};
use crate::models::question::{Question, QuestionDraft};
use crate::models::subject::{Subject, SubjectDraft};
use crate::models::test_result::{TestResult, TestResultDraft};
use crate::models::user::{User, UserDraft};

const GROUP_COLUMNS: &str = "id, name, is_archived, created_at";
const SUBJECT_COLUMNS: &str = "id, name, is_demo";
const MODULE_COLUMNS: &str =
    "id, name, is_demo, points_per_answer, duration_minutes, passing_score, randomize, is_active";
const QUESTION_COLUMNS: &str =
    "id, subject_id, text, option_a, option_b, option_c, option_d, correct_index";
const USER_COLUMNS: &str =
    "id, username, password_hash, full_name, workplace, role, group_id, is_active, created_at";
const RESULT_COLUMNS: &str = "id, participant_id, module_id, group_id, correct_answers, \
     total_questions, score, is_passed, date, time_taken";

/// Postgres-backed store over a borrowed connection.
///
/// Borrowing a `PgConnection` lets the same store run on a pooled connection or inside a
/// `Transaction` (which derefs to one).
pub struct PgStore<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgStore<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'c> EntityStore for PgStore<'c> {
    async fn exists(&mut self, kind: EntityKind, id: i64) -> Result<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)", kind.table());
        let found: bool = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(found)
    }

    async fn delete(&mut self, kind: EntityKind, id: i64) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", kind.table());
        let done = sqlx::query(&sql).bind(id).execute(&mut *self.conn).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn delete_except(&mut self, kind: EntityKind, keep: &[i64]) -> Result<u64> {
        let sql = format!("DELETE FROM {} WHERE NOT (id = ANY($1))", kind.table());
        let done = sqlx::query(&sql)
            .bind(keep.to_vec())
            .execute(&mut *self.conn)
            .await?;
        Ok(done.rows_affected())
    }

    async fn find_group(&mut self, id: i64) -> Result<Option<Group>> {
        let sql = format!("SELECT {} FROM groups WHERE id = $1", GROUP_COLUMNS);
        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(group)
    }

    async fn insert_group(&mut self, draft: &GroupDraft) -> Result<Group> {
        let sql = format!(
            "INSERT INTO groups (name, is_archived) VALUES ($1, $2) RETURNING {}",
            GROUP_COLUMNS
        );
        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(&draft.name)
            .bind(draft.is_archived)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(group)
    }

    async fn update_group(&mut self, id: i64, draft: &GroupDraft) -> Result<Group> {
        let sql = format!(
            "UPDATE groups SET name = $1, is_archived = $2 WHERE id = $3 RETURNING {}",
            GROUP_COLUMNS
        );
        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(&draft.name)
            .bind(draft.is_archived)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(group)
    }

    async fn list_groups(&mut self, ids: Option<&[i64]>) -> Result<Vec<Group>> {
        let sql = format!(
            "SELECT {} FROM groups WHERE ($1::BIGINT[] IS NULL OR id = ANY($1)) ORDER BY id DESC",
            GROUP_COLUMNS
        );
        let groups = sqlx::query_as::<_, Group>(&sql)
            .bind(ids.map(|ids| ids.to_vec()))
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(groups)
    }

    async fn set_group_modules(&mut self, group_id: i64, module_ids: &[i64]) -> Result<()> {
        sqlx::query("DELETE FROM module_groups WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *self.conn)
            .await?;
        sqlx::query(
            "INSERT INTO module_groups (module_id, group_id)
             SELECT m, $1 FROM UNNEST($2::BIGINT[]) AS m
             ON CONFLICT DO NOTHING",
        )
        .bind(group_id)
        .bind(module_ids.to_vec())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    async fn find_subject(&mut self, id: i64) -> Result<Option<Subject>> {
        let sql = format!("SELECT {} FROM subjects WHERE id = $1", SUBJECT_COLUMNS);
        let subject = sqlx::query_as::<_, Subject>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(subject)
    }

    async fn insert_subject(&mut self, draft: &SubjectDraft) -> Result<Subject> {
        let sql = format!(
            "INSERT INTO subjects (name, is_demo) VALUES ($1, $2) RETURNING {}",
            SUBJECT_COLUMNS
        );
        let subject = sqlx::query_as::<_, Subject>(&sql)
            .bind(&draft.name)
            .bind(draft.is_demo)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(subject)
    }

    async fn update_subject(&mut self, id: i64, draft: &SubjectDraft) -> Result<Subject> {
        let sql = format!(
            "UPDATE subjects SET name = $1, is_demo = $2 WHERE id = $3 RETURNING {}",
            SUBJECT_COLUMNS
        );
        let subject = sqlx::query_as::<_, Subject>(&sql)
            .bind(&draft.name)
            .bind(draft.is_demo)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(subject)
    }

    async fn list_subjects(&mut self, is_demo: Option<bool>) -> Result<Vec<Subject>> {
        let sql = format!(
            "SELECT {} FROM subjects WHERE ($1::BOOLEAN IS NULL OR is_demo = $1) ORDER BY id DESC",
            SUBJECT_COLUMNS
        );
        let subjects = sqlx::query_as::<_, Subject>(&sql)
            .bind(is_demo)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(subjects)
    }

    async fn find_module(&mut self, id: i64) -> Result<Option<Module>> {
        let sql = format!("SELECT {} FROM modules WHERE id = $1", MODULE_COLUMNS);
        let module = sqlx::query_as::<_, Module>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(module)
    }

    async fn insert_module(&mut self, draft: &ModuleDraft) -> Result<Module> {
        let sql = format!(
            "INSERT INTO modules (
                name, is_demo, points_per_answer, duration_minutes, passing_score, randomize, is_active
             ) VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            MODULE_COLUMNS
        );
        let module = sqlx::query_as::<_, Module>(&sql)
            .bind(&draft.name)
            .bind(draft.is_demo)
            .bind(draft.settings.points_per_answer)
            .bind(draft.settings.duration_minutes)
            .bind(draft.settings.passing_score)
            .bind(draft.settings.randomize)
            .bind(draft.settings.is_active)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(module)
    }

    async fn update_module(&mut self, id: i64, draft: &ModuleDraft) -> Result<Module> {
        let sql = format!(
            "UPDATE modules SET
                name = $1, is_demo = $2, points_per_answer = $3, duration_minutes = $4,
                passing_score = $5, randomize = $6, is_active = $7
             WHERE id = $8
             RETURNING {}",
            MODULE_COLUMNS
        );
        let module = sqlx::query_as::<_, Module>(&sql)
            .bind(&draft.name)
            .bind(draft.is_demo)
            .bind(draft.settings.points_per_answer)
            .bind(draft.settings.duration_minutes)
            .bind(draft.settings.passing_score)
            .bind(draft.settings.randomize)
            .bind(draft.settings.is_active)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(module)
    }

    async fn list_modules(&mut self, is_demo: Option<bool>) -> Result<Vec<Module>> {
        let sql = format!(
            "SELECT {} FROM modules WHERE ($1::BOOLEAN IS NULL OR is_demo = $1) ORDER BY id DESC",
            MODULE_COLUMNS
        );
        let modules = sqlx::query_as::<_, Module>(&sql)
            .bind(is_demo)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(modules)
    }

    async fn set_module_groups(&mut self, module_id: i64, group_ids: &[i64]) -> Result<()> {
        sqlx::query("DELETE FROM module_groups WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *self.conn)
            .await?;
        sqlx::query(
            "INSERT INTO module_groups (module_id, group_id)
             SELECT $1, g FROM UNNEST($2::BIGINT[]) AS g
             ON CONFLICT DO NOTHING",
        )
        .bind(module_id)
        .bind(group_ids.to_vec())
        .execute(&mut *self.conn)
        .await?;
        Ok(())
    }

    async fn module_group_links(&mut self) -> Result<Vec<ModuleGroupLink>> {
        let links = sqlx::query_as::<_, ModuleGroupLink>(
            "SELECT module_id, group_id FROM module_groups ORDER BY module_id, group_id",
        )
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(links)
    }

    async fn module_group_ids(&mut self, module_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT group_id FROM module_groups WHERE module_id = $1 ORDER BY group_id",
        )
        .bind(module_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(ids)
    }

    async fn subject_configs(&mut self, module_id: i64) -> Result<Vec<ModuleSubjectConfig>> {
        let configs = sqlx::query_as::<_, ModuleSubjectConfig>(
            "SELECT id, module_id, subject_id, question_count
             FROM module_subject_configs WHERE module_id = $1 ORDER BY id",
        )
        .bind(module_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(configs)
    }

    async fn all_subject_configs(&mut self) -> Result<Vec<ModuleSubjectConfig>> {
        let configs = sqlx::query_as::<_, ModuleSubjectConfig>(
            "SELECT id, module_id, subject_id, question_count
             FROM module_subject_configs ORDER BY module_id, id",
        )
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(configs)
    }

    async fn replace_subject_configs(&mut self, module_id: i64, configs: &[(i64, i32)]) -> Result<()> {
        sqlx::query("DELETE FROM module_subject_configs WHERE module_id = $1")
            .bind(module_id)
            .execute(&mut *self.conn)
            .await?;
        for (subject_id, question_count) in configs {
            sqlx::query(
                "INSERT INTO module_subject_configs (module_id, subject_id, question_count)
                 VALUES ($1, $2, $3)",
            )
            .bind(module_id)
            .bind(subject_id)
            .bind(question_count)
            .execute(&mut *self.conn)
            .await?;
        }
        Ok(())
    }

    async fn find_question(&mut self, id: i64) -> Result<Option<Question>> {
        let sql = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(question)
    }

    async fn insert_question(&mut self, draft: &QuestionDraft) -> Result<Question> {
        let sql = format!(
            "INSERT INTO questions (subject_id, text, option_a, option_b, option_c, option_d, correct_index)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            QUESTION_COLUMNS
        );
        let [a, b, c, d] = &draft.options;
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(draft.subject_id)
            .bind(&draft.text)
            .bind(a)
            .bind(b)
            .bind(c)
            .bind(d)
            .bind(draft.correct_index)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(question)
    }

    async fn update_question(&mut self, id: i64, draft: &QuestionDraft) -> Result<Question> {
        let sql = format!(
            "UPDATE questions SET
                subject_id = $1, text = $2, option_a = $3, option_b = $4,
                option_c = $5, option_d = $6, correct_index = $7
             WHERE id = $8
             RETURNING {}",
            QUESTION_COLUMNS
        );
        let [a, b, c, d] = &draft.options;
        let question = sqlx::query_as::<_, Question>(&sql)
            .bind(draft.subject_id)
            .bind(&draft.text)
            .bind(a)
            .bind(b)
            .bind(c)
            .bind(d)
            .bind(draft.correct_index)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(question)
    }

    async fn list_questions(&mut self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let sql = format!(
            "SELECT {} FROM questions
             WHERE ($1::BOOLEAN IS NULL
                    OR subject_id IN (SELECT id FROM subjects WHERE is_demo = $1))
               AND ($2::BIGINT IS NULL OR subject_id = $2)
               AND ($3::BIGINT[] IS NULL OR subject_id = ANY($3))
             ORDER BY id DESC",
            QUESTION_COLUMNS
        );
        let questions = sqlx::query_as::<_, Question>(&sql)
            .bind(filter.is_demo)
            .bind(filter.subject_id)
            .bind(filter.subject_ids.clone())
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(questions)
    }

    async fn questions_for_subject(&mut self, subject_id: i64) -> Result<Vec<Question>> {
        let sql = format!(
            "SELECT {} FROM questions WHERE subject_id = $1 ORDER BY id",
            QUESTION_COLUMNS
        );
        let questions = sqlx::query_as::<_, Question>(&sql)
            .bind(subject_id)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(questions)
    }

    async fn questions_in_subjects(&mut self, ids: &[i64], subject_ids: &[i64]) -> Result<Vec<Question>> {
        let sql = format!(
            "SELECT {} FROM questions WHERE id = ANY($1) AND subject_id = ANY($2) ORDER BY id",
            QUESTION_COLUMNS
        );
        let questions = sqlx::query_as::<_, Question>(&sql)
            .bind(ids.to_vec())
            .bind(subject_ids.to_vec())
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(questions)
    }

    async fn find_user(&mut self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(user)
    }

    async fn insert_user(&mut self, draft: &UserDraft, password_hash: Option<&str>) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (username, password_hash, full_name, workplace, role, group_id, is_active)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&draft.username)
            .bind(password_hash)
            .bind(&draft.full_name)
            .bind(&draft.workplace)
            .bind(draft.role.as_str())
            .bind(draft.group_id)
            .bind(draft.is_active)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(user)
    }

    async fn update_user(&mut self, id: i64, draft: &UserDraft, password_hash: Option<&str>) -> Result<User> {
        let sql = format!(
            "UPDATE users SET
                username = $1, password_hash = COALESCE($2, password_hash), full_name = $3,
                workplace = $4, role = $5, group_id = $6, is_active = $7
             WHERE id = $8
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&draft.username)
            .bind(password_hash)
            .bind(&draft.full_name)
            .bind(&draft.workplace)
            .bind(draft.role.as_str())
            .bind(draft.group_id)
            .bind(draft.is_active)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(user)
    }

    async fn list_users(&mut self, ids: Option<&[i64]>) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE ($1::BIGINT[] IS NULL OR id = ANY($1)) ORDER BY id DESC",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(ids.map(|ids| ids.to_vec()))
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(users)
    }

    async fn lock_user(&mut self, id: i64) -> Result<()> {
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    async fn find_result(&mut self, id: i64) -> Result<Option<TestResult>> {
        let sql = format!("SELECT {} FROM test_results WHERE id = $1", RESULT_COLUMNS);
        let result = sqlx::query_as::<_, TestResult>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(result)
    }

    async fn insert_result(&mut self, draft: &TestResultDraft) -> Result<TestResult> {
        let sql = format!(
            "INSERT INTO test_results (
                participant_id, module_id, group_id, correct_answers, total_questions,
                score, is_passed, time_taken
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {}",
            RESULT_COLUMNS
        );
        let result = sqlx::query_as::<_, TestResult>(&sql)
            .bind(draft.participant_id)
            .bind(draft.module_id)
            .bind(draft.group_id)
            .bind(draft.correct_answers)
            .bind(draft.total_questions)
            .bind(draft.score)
            .bind(draft.is_passed)
            .bind(draft.time_taken)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(result)
    }

    async fn update_result(&mut self, id: i64, draft: &TestResultDraft) -> Result<TestResult> {
        let sql = format!(
            "UPDATE test_results SET
                participant_id = $1, module_id = $2, group_id = $3, correct_answers = $4,
                total_questions = $5, score = $6, is_passed = $7, time_taken = $8
             WHERE id = $9
             RETURNING {}",
            RESULT_COLUMNS
        );
        let result = sqlx::query_as::<_, TestResult>(&sql)
            .bind(draft.participant_id)
            .bind(draft.module_id)
            .bind(draft.group_id)
            .bind(draft.correct_answers)
            .bind(draft.total_questions)
            .bind(draft.score)
            .bind(draft.is_passed)
            .bind(draft.time_taken)
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(result)
    }

    async fn list_results(&mut self, filter: &ResultFilter) -> Result<Vec<TestResult>> {
        let sql = format!(
            "SELECT {} FROM test_results
             WHERE ($1::BIGINT IS NULL OR participant_id = $1)
               AND ($2::BOOLEAN IS NULL
                    OR module_id IN (SELECT id FROM modules WHERE is_demo = $2))
             ORDER BY date DESC, id DESC",
            RESULT_COLUMNS
        );
        let results = sqlx::query_as::<_, TestResult>(&sql)
            .bind(filter.participant_id)
            .bind(filter.is_demo)
            .fetch_all(&mut *self.conn)
            .await?;
        Ok(results)
    }

    async fn count_attempts(&mut self, participant_id: i64, module_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM test_results WHERE participant_id = $1 AND module_id = $2",
        )
        .bind(participant_id)
        .bind(module_id)
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(count)
    }
}
