use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::database::pg_store::PgStore;
use crate::database::store::{EntityStore, ResultFilter};
use crate::dto::test_dto::{AvailableTest, AvailableTests, StartTestRequest, StartedTest, SubmitTestRequest};
use crate::error::{Error, Result};
use crate::models::module::Module;
use crate::models::test_result::{TestResult, TestResultDraft};
use crate::models::user::User;
use crate::services::grading_service::GradingService;
use crate::services::selection_service::select_questions;
use crate::utils::coerce::clamp_i32;

/// Attempts a participant may make on one demo module.
pub const DEMO_MAX_ATTEMPTS: i64 = 5;

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
}

impl AttemptService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn available(&self, user: &User) -> Result<AvailableTests> {
        let mut conn = self.pool.acquire().await?;
        available_tests(&mut PgStore::new(&mut *conn), user).await
    }

    pub async fn start(&self, user: &User, request: &StartTestRequest) -> Result<StartedTest> {
        let mut conn = self.pool.acquire().await?;
        let mut rng = StdRng::from_entropy();
        start_attempt(&mut PgStore::new(&mut *conn), user, request, &mut rng).await
    }

    /// Scores and records a submission in one transaction. The participant row is locked
    /// first so concurrent submissions by the same participant run one after another.
    pub async fn submit(&self, user: &User, request: &SubmitTestRequest) -> Result<TestResult> {
        let mut tx = self.pool.begin().await?;
        let result = submit_attempt(&mut PgStore::new(&mut *tx), user, request).await?;
        tx.commit().await?;
        Ok(result)
    }
}

/// Resolves a module the participant may attempt right now.
///
/// Checks run in a fixed order: the module exists and is active, the attempt budget is
/// not spent (demo: fewer than five, live: none), and the participant's group is assigned.
pub async fn check_eligibility<S>(store: &mut S, user: &User, module_id: i64) -> Result<Module>
where
    S: EntityStore + ?Sized,
{
    let module = store
        .find_module(module_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or_else(|| Error::NotFound("Test topilmadi".to_string()))?;

    let attempts = store.count_attempts(user.id, module.id).await?;
    if module.is_demo && attempts >= DEMO_MAX_ATTEMPTS {
        return Err(Error::AttemptLimitExceeded("Sizda limit tugadi".to_string()));
    }
    if !module.is_demo && attempts > 0 {
        return Err(Error::AlreadyAttempted(
            "Bu test allaqachon topshirilgan".to_string(),
        ));
    }

    let assigned = match user.group_id {
        Some(group_id) => store.module_group_ids(module.id).await?.contains(&group_id),
        None => false,
    };
    if !assigned {
        return Err(Error::Forbidden(
            "Siz bu testga biriktirilmagansiz".to_string(),
        ));
    }

    Ok(module)
}

/// Active modules assigned to the participant's group, split into live and demo.
pub async fn available_tests<S>(store: &mut S, user: &User) -> Result<AvailableTests>
where
    S: EntityStore + ?Sized,
{
    let Some(group_id) = user.group_id else {
        return Ok(AvailableTests::default());
    };

    let taken: Vec<i64> = store
        .list_results(&ResultFilter {
            participant_id: Some(user.id),
            is_demo: Some(false),
        })
        .await?
        .into_iter()
        .map(|r| r.module_id)
        .collect();

    let mut tests = AvailableTests::default();
    for module in store.list_modules(None).await? {
        if !module.is_active || !store.module_group_ids(module.id).await?.contains(&group_id) {
            continue;
        }
        if module.is_demo {
            tests.demo.push(AvailableTest {
                id: module.id,
                name: module.name.clone(),
                already_taken: None,
                settings: module.settings(),
            });
        } else {
            tests.main.push(AvailableTest {
                id: module.id,
                name: module.name.clone(),
                already_taken: Some(taken.contains(&module.id)),
                settings: module.settings(),
            });
        }
    }
    Ok(tests)
}

fn requested_module(raw: Option<i64>, message: &str) -> Result<i64> {
    raw.filter(|id| *id != 0)
        .ok_or_else(|| Error::BadRequest(message.to_string()))
}

pub async fn start_attempt<S, R>(
    store: &mut S,
    user: &User,
    request: &StartTestRequest,
    rng: &mut R,
) -> Result<StartedTest>
where
    S: EntityStore + ?Sized,
    R: Rng + Send + ?Sized,
{
    let module_id = requested_module(request.module_id.0, "moduleId kerak")?;
    let module = check_eligibility(store, user, module_id).await?;
    let questions = select_questions(store, &module, rng).await?;

    tracing::info!(
        participant_id = user.id,
        module_id = module.id,
        questions = questions.len(),
        "test started"
    );
    Ok(StartedTest::new(&module, &questions))
}

pub async fn submit_attempt<S>(store: &mut S, user: &User, request: &SubmitTestRequest) -> Result<TestResult>
where
    S: EntityStore + ?Sized,
{
    let has_answers = matches!(&request.answers, JsonValue::Object(map) if !map.is_empty());
    let module_id = requested_module(request.module_id.0, "moduleId va answers kerak")?;
    if !has_answers {
        return Err(Error::BadRequest("moduleId va answers kerak".to_string()));
    }
    let time_taken = match request.time_taken.0 {
        Some(seconds) if seconds < 0 => {
            return Err(Error::BadRequest("timeTaken manfiy bo'lmasligi kerak".to_string()));
        }
        other => other.map(clamp_i32),
    };

    store.lock_user(user.id).await?;
    let participant = store
        .find_user(user.id)
        .await?
        .ok_or_else(|| Error::Unauthorized("User not found".to_string()))?;

    let module = check_eligibility(store, &participant, module_id).await?;
    let answers = GradingService::parse_answers(&request.answers)?;

    let question_ids: Vec<i64> = answers.iter().map(|a| a.question_id).collect();
    let subject_ids: Vec<i64> = store
        .subject_configs(module.id)
        .await?
        .into_iter()
        .map(|c| c.subject_id)
        .collect();
    let questions = store.questions_in_subjects(&question_ids, &subject_ids).await?;
    if questions.len() != question_ids.len() {
        return Err(Error::BadRequest("Ba'zi savollar topilmadi".to_string()));
    }

    let grade = GradingService::grade(&module, &questions, &answers);
    let result = store
        .insert_result(&TestResultDraft {
            participant_id: participant.id,
            module_id: module.id,
            group_id: participant.group_id,
            correct_answers: grade.correct_answers,
            total_questions: grade.total_questions,
            score: grade.score,
            is_passed: grade.is_passed,
            time_taken,
        })
        .await?;

    tracing::info!(
        participant_id = participant.id,
        module_id = module.id,
        score = result.score,
        passed = result.is_passed,
        "test submitted"
    );
    Ok(result)
}
