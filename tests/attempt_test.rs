use assessment_backend::database::memory_store::MemoryStore;
use assessment_backend::database::store::EntityStore;
use assessment_backend::dto::test_dto::{StartTestRequest, SubmitTestRequest};
use assessment_backend::error::{Error, Result};
use assessment_backend::models::module::{Module, ModuleDraft};
use assessment_backend::models::question::Question;
use assessment_backend::models::user::{Role, User, UserDraft};
use assessment_backend::services::attempt_service::{available_tests, start_attempt, submit_attempt};
use assessment_backend::services::seed_service::seed_demo;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Map, Value as JsonValue};

fn fake_hash(plain: &str) -> Result<String> {
    Ok(format!("hashed:{}", plain))
}

struct Fixture {
    store: MemoryStore,
    participant: User,
    live: Module,
    demo: Module,
}

async fn fixture() -> Fixture {
    let mut store = MemoryStore::new();
    assert!(seed_demo(&mut store, fake_hash).await.unwrap());
    let participant = store.find_user_by_username("tinglovchi").await.unwrap().unwrap();
    let modules = store.list_modules(None).await.unwrap();
    let live = modules.iter().find(|m| !m.is_demo).unwrap().clone();
    let demo = modules.iter().find(|m| m.is_demo).unwrap().clone();
    Fixture {
        store,
        participant,
        live,
        demo,
    }
}

fn start_request(module_id: i64) -> StartTestRequest {
    serde_json::from_value(json!({ "moduleId": module_id })).unwrap()
}

fn submit_request(module_id: JsonValue, answers: JsonValue) -> SubmitTestRequest {
    serde_json::from_value(json!({ "moduleId": module_id, "answers": answers, "timeTaken": "95" })).unwrap()
}

/// Answers the first `correct` questions right and the rest wrong.
async fn answers_for(store: &mut MemoryStore, module: &Module, correct: usize) -> JsonValue {
    let configs = store.subject_configs(module.id).await.unwrap();
    let mut questions: Vec<Question> = Vec::new();
    for config in configs {
        questions.extend(store.questions_for_subject(config.subject_id).await.unwrap());
    }
    let answers: Map<String, JsonValue> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let choice = if i < correct { q.correct_index } else { (q.correct_index + 1) % 4 };
            (q.id.to_string(), json!(choice))
        })
        .collect();
    JsonValue::Object(answers)
}

#[tokio::test]
async fn participant_sees_assigned_modules() {
    let mut f = fixture().await;
    let tests = available_tests(&mut f.store, &f.participant).await.unwrap();

    assert_eq!(tests.main.len(), 1);
    assert_eq!(tests.main[0].id, f.live.id);
    assert_eq!(tests.main[0].already_taken, Some(false));
    assert_eq!(tests.demo.len(), 1);
    assert_eq!(tests.demo[0].id, f.demo.id);
    assert_eq!(tests.demo[0].already_taken, None);
}

#[tokio::test]
async fn start_draws_the_configured_quota() {
    let mut f = fixture().await;
    let mut rng = StdRng::seed_from_u64(7);
    let started = start_attempt(&mut f.store, &f.participant, &start_request(f.live.id), &mut rng)
        .await
        .unwrap();

    assert_eq!(started.module_id, f.live.id);
    assert!(!started.is_demo);
    assert_eq!(started.questions.len(), 5);
    let mut ids: Vec<i64> = started.questions.iter().map(|q| q.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);

    let body = serde_json::to_value(&started).unwrap();
    assert!(body["questions"][0].get("correctIndex").is_none());
}

#[tokio::test]
async fn live_module_can_be_taken_once() {
    let mut f = fixture().await;
    let answers = answers_for(&mut f.store, &f.live, 5).await;

    let result = submit_attempt(&mut f.store, &f.participant, &submit_request(json!(f.live.id), answers.clone()))
        .await
        .unwrap();
    assert_eq!(result.correct_answers, 5);
    assert_eq!(result.total_questions, 5);
    assert_eq!(result.score, 25);
    assert!(result.is_passed);
    assert_eq!(result.group_id, f.participant.group_id);
    assert_eq!(result.time_taken, Some(95));

    let again = submit_attempt(&mut f.store, &f.participant, &submit_request(json!(f.live.id), answers)).await;
    assert!(matches!(again, Err(Error::AlreadyAttempted(_))));

    let mut rng = StdRng::seed_from_u64(1);
    let restart = start_attempt(&mut f.store, &f.participant, &start_request(f.live.id), &mut rng).await;
    assert!(matches!(restart, Err(Error::AlreadyAttempted(_))));

    let tests = available_tests(&mut f.store, &f.participant).await.unwrap();
    assert_eq!(tests.main[0].already_taken, Some(true));
}

#[tokio::test]
async fn sixth_demo_attempt_is_refused() {
    let mut f = fixture().await;
    let answers = answers_for(&mut f.store, &f.demo, 1).await;

    for _ in 0..5 {
        submit_attempt(&mut f.store, &f.participant, &submit_request(json!(f.demo.id), answers.clone()))
            .await
            .unwrap();
    }
    let sixth = submit_attempt(&mut f.store, &f.participant, &submit_request(json!(f.demo.id), answers)).await;
    match sixth {
        Err(Error::AttemptLimitExceeded(message)) => assert_eq!(message, "Sizda limit tugadi"),
        other => panic!("expected attempt limit, got {:?}", other),
    }
}

#[tokio::test]
async fn passing_is_score_at_or_above_threshold() {
    let mut f = fixture().await;
    let answers = answers_for(&mut f.store, &f.live, 3).await;
    let result = submit_attempt(&mut f.store, &f.participant, &submit_request(json!(f.live.id), answers))
        .await
        .unwrap();
    assert_eq!(result.correct_answers, 3);
    assert_eq!(result.score, 15);
    assert!(result.is_passed);

    let mut f = fixture().await;
    let answers = answers_for(&mut f.store, &f.live, 2).await;
    let result = submit_attempt(&mut f.store, &f.participant, &submit_request(json!(f.live.id), answers))
        .await
        .unwrap();
    assert_eq!(result.score, 10);
    assert!(!result.is_passed);
}

#[tokio::test]
async fn participant_outside_the_group_is_forbidden() {
    let mut f = fixture().await;
    let outsider = f
        .store
        .insert_user(
            &UserDraft {
                username: "begona".into(),
                full_name: "Begona".into(),
                workplace: String::new(),
                role: Role::Participant,
                group_id: None,
                is_active: true,
            },
            None,
        )
        .await
        .unwrap();

    let mut rng = StdRng::seed_from_u64(3);
    let start = start_attempt(&mut f.store, &outsider, &start_request(f.live.id), &mut rng).await;
    assert!(matches!(start, Err(Error::Forbidden(_))));
    let tests = available_tests(&mut f.store, &outsider).await.unwrap();
    assert!(tests.main.is_empty() && tests.demo.is_empty());
}

#[tokio::test]
async fn inactive_or_unknown_module_is_not_found() {
    let mut f = fixture().await;
    let mut settings = f.live.settings();
    settings.is_active = false;
    f.store
        .update_module(
            f.live.id,
            &ModuleDraft {
                name: f.live.name.clone(),
                is_demo: false,
                settings,
            },
        )
        .await
        .unwrap();

    let mut rng = StdRng::seed_from_u64(5);
    let inactive = start_attempt(&mut f.store, &f.participant, &start_request(f.live.id), &mut rng).await;
    assert!(matches!(inactive, Err(Error::NotFound(_))));
    let unknown = start_attempt(&mut f.store, &f.participant, &start_request(999), &mut rng).await;
    assert!(matches!(unknown, Err(Error::NotFound(_))));

    let tests = available_tests(&mut f.store, &f.participant).await.unwrap();
    assert!(tests.main.is_empty());
}

#[tokio::test]
async fn malformed_submissions_are_rejected() {
    let mut f = fixture().await;
    let cases = [
        (json!(null), json!({ "1": 0 }), "moduleId va answers kerak"),
        (json!(f.live.id), json!({}), "moduleId va answers kerak"),
        (json!(f.live.id), json!({ "birinchi": 0 }), "answers keylari savol ID bo'lishi kerak"),
        (json!(f.live.id), json!({ "6": 0 }), "Ba'zi savollar topilmadi"),
        (json!(f.live.id), json!({ "1": 0, "404": 1 }), "Ba'zi savollar topilmadi"),
    ];
    for (module_id, answers, expected) in cases {
        match submit_attempt(&mut f.store, &f.participant, &submit_request(module_id, answers)).await {
            Err(Error::BadRequest(message)) => assert_eq!(message, expected),
            other => panic!("expected bad request, got {:?}", other),
        }
    }
    assert_eq!(f.store.count_attempts(f.participant.id, f.live.id).await.unwrap(), 0);
}

#[tokio::test]
async fn start_without_module_id_is_a_bad_request() {
    let mut f = fixture().await;
    let mut rng = StdRng::seed_from_u64(9);
    let request: StartTestRequest = serde_json::from_value(json!({})).unwrap();
    match start_attempt(&mut f.store, &f.participant, &request, &mut rng).await {
        Err(Error::BadRequest(message)) => assert_eq!(message, "moduleId kerak"),
        other => panic!("expected bad request, got {:?}", other),
    }
}

#[tokio::test]
async fn negative_time_taken_is_a_bad_request() {
    let mut f = fixture().await;
    let answers = answers_for(&mut f.store, &f.live, 5).await;
    let request: SubmitTestRequest =
        serde_json::from_value(json!({ "moduleId": f.live.id, "answers": answers, "timeTaken": -5 })).unwrap();

    match submit_attempt(&mut f.store, &f.participant, &request).await {
        Err(Error::BadRequest(message)) => assert_eq!(message, "timeTaken manfiy bo'lmasligi kerak"),
        other => panic!("expected bad request, got {:?}", other),
    }
    assert_eq!(f.store.count_attempts(f.participant.id, f.live.id).await.unwrap(), 0);

    let untimed: SubmitTestRequest =
        serde_json::from_value(json!({ "moduleId": f.live.id, "answers": answers })).unwrap();
    let result = submit_attempt(&mut f.store, &f.participant, &untimed).await.unwrap();
    assert_eq!(result.time_taken, None);
}
