use assessment_backend::database::memory_store::MemoryStore;
use assessment_backend::database::store::{EntityKind, EntityStore, QuestionFilter, ResultFilter};
use assessment_backend::dto::snapshot_dto::Snapshot;
use assessment_backend::dto::sync_dto::SnapshotPayload;
use assessment_backend::error::Result;
use assessment_backend::models::user::{Role, User, UserDraft};
use assessment_backend::services::snapshot_service::project;
use assessment_backend::services::sync_service::{reconcile, SyncOptions, SyncReport};
use serde_json::{json, Value as JsonValue};

fn fake_hash(plain: &str) -> Result<String> {
    Ok(format!("hashed:{}", plain))
}

fn options(caller: &User) -> SyncOptions {
    SyncOptions {
        caller_id: caller.id,
        default_password: "boshlangich".to_string(),
        hash_password: fake_hash,
    }
}

async fn store_with_admin() -> (MemoryStore, User) {
    let mut store = MemoryStore::new();
    let admin = store
        .insert_user(
            &UserDraft {
                username: "admin".into(),
                full_name: "Admin User".into(),
                workplace: "Markaz".into(),
                role: Role::Admin,
                group_id: None,
                is_active: true,
            },
            Some("hashed:123"),
        )
        .await
        .unwrap();
    (store, admin)
}

async fn sync(store: &mut MemoryStore, caller: &User, payload: JsonValue) -> (SyncReport, Snapshot) {
    let payload: SnapshotPayload = serde_json::from_value(payload).expect("payload");
    let report = reconcile(store, &payload, &options(caller)).await.expect("reconcile");
    let snapshot = project(store, caller).await.expect("project");
    (report, snapshot)
}

fn four(prefix: &str) -> JsonValue {
    json!([
        format!("{} A", prefix),
        format!("{} B", prefix),
        format!("{} C", prefix),
        format!("{} D", prefix)
    ])
}

fn cohort_payload() -> JsonValue {
    json!({
        "groups": [{ "id": "g-1", "name": "Guruh A" }],
        "subjects": [{ "id": "s-1", "name": "Rangshunoslik" }],
        "demoSubjects": [{ "id": "ds-1", "name": "Demo fan" }],
        "modules": [{
            "id": "m-1",
            "name": "Kompozitsiya",
            "groupIds": ["g-1", "g-1", "missing"],
            "subjectConfigs": [
                { "subjectId": "s-1", "questionCount": "2" },
                { "subjectId": "s-1", "questionCount": 9 },
                { "subjectId": "nope", "questionCount": 1 }
            ],
            "settings": { "pointsPerAnswer": 4, "passingScore": 8 }
        }],
        "demoModules": [{
            "id": "dm-1",
            "name": "Demo modul",
            "groupIds": ["g-1"],
            "subjectConfigs": [{ "subjectId": "ds-1", "questionCount": 1 }]
        }],
        "questions": [
            { "id": "q-1", "subjectId": "s-1", "text": "Birinchi", "options": four("q1"), "correctIndex": 1 },
            { "id": "q-2", "subjectId": "s-1", "text": "Ikkinchi", "options": four("q2"), "correctIndex": "3" }
        ],
        "demoQuestions": [
            { "id": "dq-1", "subjectId": "ds-1", "text": "Demo", "options": four("dq"), "correctIndex": 0 },
            { "id": "dq-2", "subjectId": "ds-1", "text": "Uch variant", "options": ["a", "b", "c"], "correctIndex": 0 }
        ],
        "users": [{
            "id": "u-1",
            "username": "  ali  ",
            "fullName": "Ali Valiyev",
            "role": "tinglovchi",
            "groupId": "g-1"
        }],
        "results": [
            {
                "id": "r-1",
                "participantId": "u-1",
                "moduleId": "m-1",
                "groupId": "g-1",
                "correctAnswers": 2,
                "totalQuestions": 2,
                "score": 8,
                "isPassed": true
            },
            { "id": "r-2", "participantId": "ghost", "moduleId": "m-1" }
        ]
    })
}

#[tokio::test]
async fn sync_builds_graph_from_client_tokens() {
    let (mut store, admin) = store_with_admin().await;
    let (report, snapshot) = sync(&mut store, &admin, cohort_payload()).await;

    assert_eq!(report.groups.kept, 1);
    assert_eq!(report.modules.kept, 2);
    assert_eq!(report.modules.skipped, 0);
    assert_eq!(report.configs_skipped, 1);
    assert_eq!(report.questions.kept, 3);
    assert_eq!(report.questions.skipped, 1);
    assert_eq!(report.results.kept, 1);
    assert_eq!(report.results.skipped, 1);

    let group = &snapshot.groups[0];
    assert_eq!(group.name, "Guruh A");
    assert_eq!(group.module_ids.len(), 2);

    let module = &snapshot.modules[0];
    assert_eq!(module.group_ids, vec![group.id]);
    assert_eq!(module.subject_configs.len(), 1);
    assert_eq!(module.subject_configs[0].subject_id, snapshot.subjects[0].id);
    assert_eq!(module.subject_configs[0].question_count, 2);
    assert_eq!(module.settings.points_per_answer, 4);
    assert_eq!(module.settings.duration_minutes, 30);
    assert_eq!(module.settings.passing_score, 8);
    assert!(module.settings.randomize);

    assert!(snapshot.demo_modules[0].is_demo);
    assert!(snapshot.demo_subjects[0].is_demo);
    assert_eq!(snapshot.questions.len(), 2);
    assert_eq!(snapshot.demo_questions.len(), 1);
    assert!(snapshot.questions.iter().any(|q| q.text == "Ikkinchi" && q.correct_index == 3));

    let ali = snapshot.users.iter().find(|u| u.username == "ali").expect("ali");
    assert_eq!(ali.role, "TINGLOVCHI");
    assert_eq!(ali.group_id, Some(group.id));
    let stored = store.find_user(ali.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash.as_deref(), Some("hashed:boshlangich"));

    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(snapshot.results[0].participant_id, ali.id);
    assert_eq!(snapshot.results[0].module_id, module.id);
    assert_eq!(snapshot.results[0].group_id, Some(group.id));
    assert!(snapshot.demo_results.is_empty());
    assert_references_resolve(&mut store, &snapshot).await;
}

/// Every stored reference points at a row that still exists.
async fn assert_references_resolve(store: &mut MemoryStore, snapshot: &Snapshot) {
    let groups: Vec<i64> = store.list_groups(None).await.unwrap().iter().map(|g| g.id).collect();
    let subjects: Vec<i64> = store.list_subjects(None).await.unwrap().iter().map(|s| s.id).collect();
    let modules: Vec<i64> = store.list_modules(None).await.unwrap().iter().map(|m| m.id).collect();
    let users = store.list_users(None).await.unwrap();
    let user_ids: Vec<i64> = users.iter().map(|u| u.id).collect();

    for module_id in &modules {
        for config in store.subject_configs(*module_id).await.unwrap() {
            assert!(subjects.contains(&config.subject_id), "config {:?}", config);
        }
    }
    for module in snapshot.modules.iter().chain(snapshot.demo_modules.iter()) {
        assert!(module.group_ids.iter().all(|g| groups.contains(g)), "module {}", module.id);
    }
    for question in store.list_questions(&QuestionFilter::default()).await.unwrap() {
        assert!(subjects.contains(&question.subject_id), "question {}", question.id);
    }
    for user in &users {
        assert!(user.group_id.map_or(true, |g| groups.contains(&g)), "user {}", user.id);
    }
    for result in store.list_results(&ResultFilter::default()).await.unwrap() {
        assert!(user_ids.contains(&result.participant_id), "result {}", result.id);
        assert!(modules.contains(&result.module_id), "result {}", result.id);
        assert!(result.group_id.map_or(true, |g| groups.contains(&g)), "result {}", result.id);
    }
}

/// Subject-configs are recreated on every sync, so their own ids are left out.
fn module_shape(snapshot: &Snapshot) -> Vec<(i64, Vec<i64>, Vec<(i64, i32)>, String)> {
    snapshot
        .modules
        .iter()
        .chain(snapshot.demo_modules.iter())
        .map(|m| {
            (
                m.id,
                m.group_ids.clone(),
                m.subject_configs.iter().map(|c| (c.subject_id, c.question_count)).collect(),
                serde_json::to_string(&m.settings).unwrap(),
            )
        })
        .collect()
}

#[tokio::test]
async fn resyncing_the_returned_snapshot_changes_nothing() {
    let (mut store, admin) = store_with_admin().await;
    let (_, first) = sync(&mut store, &admin, cohort_payload()).await;

    let echoed = serde_json::to_value(&first).unwrap();
    let (report, second) = sync(&mut store, &admin, echoed).await;

    assert_eq!(report.groups.deleted, 0);
    assert_eq!(report.modules.deleted, 0);
    assert_eq!(report.questions.deleted, 0);
    assert_eq!(report.results.deleted, 0);
    assert_eq!(first.groups.iter().map(|g| g.id).collect::<Vec<_>>(), second.groups.iter().map(|g| g.id).collect::<Vec<_>>());
    assert_eq!(module_shape(&first), module_shape(&second));
    assert_eq!(first.questions, second.questions);
    assert_eq!(first.results, second.results);
    assert_eq!(first.users, second.users);
}

#[tokio::test]
async fn rows_missing_from_the_payload_are_deleted() {
    let (mut store, admin) = store_with_admin().await;
    let (_, first) = sync(&mut store, &admin, cohort_payload()).await;
    let ali_id = first.users.iter().find(|u| u.username == "ali").unwrap().id;

    let mut payload = serde_json::to_value(&first).unwrap();
    payload["groups"] = json!([]);
    payload["demoModules"] = json!([]);
    let (report, second) = sync(&mut store, &admin, payload).await;

    assert_eq!(report.groups.deleted, 1);
    assert_eq!(report.modules.deleted, 1);
    assert!(second.groups.is_empty());
    assert!(second.demo_modules.is_empty());
    assert!(second.modules[0].group_ids.is_empty());
    let ali = second.users.iter().find(|u| u.id == ali_id).unwrap();
    assert_eq!(ali.group_id, None);
    assert_eq!(second.results.len(), 1);
    assert_eq!(second.results[0].group_id, None);
    assert_references_resolve(&mut store, &second).await;
}

#[tokio::test]
async fn omitted_subject_takes_its_questions_and_configs_along() {
    let (mut store, admin) = store_with_admin().await;
    let (_, first) = sync(&mut store, &admin, cohort_payload()).await;
    let module_id = first.modules[0].id;

    let mut payload = serde_json::to_value(&first).unwrap();
    payload["subjects"] = json!([]);
    let (report, second) = sync(&mut store, &admin, payload).await;

    assert_eq!(report.subjects.deleted, 1);
    assert_eq!(report.configs_skipped, 1);
    assert_eq!(report.questions.skipped, 2);
    assert!(second.subjects.is_empty());
    assert!(second.questions.is_empty());
    assert_eq!(second.demo_questions.len(), 1);
    assert!(store.subject_configs(module_id).await.unwrap().is_empty());
    let module = second.modules.iter().find(|m| m.id == module_id).unwrap();
    assert!(module.subject_configs.is_empty());
    assert_eq!(second.demo_modules[0].subject_configs.len(), 1);
    assert_eq!(second.results.len(), 1);
    assert_references_resolve(&mut store, &second).await;
}

#[tokio::test]
async fn omitted_user_takes_their_results_along() {
    let (mut store, admin) = store_with_admin().await;
    let (_, first) = sync(&mut store, &admin, cohort_payload()).await;
    let ali_id = first.users.iter().find(|u| u.username == "ali").unwrap().id;

    let mut payload = serde_json::to_value(&first).unwrap();
    payload["users"] = json!([{ "id": admin.id, "username": "admin", "role": "ADMIN" }]);
    let (report, second) = sync(&mut store, &admin, payload).await;

    assert_eq!(report.users.deleted, 1);
    assert_eq!(report.results.skipped, 1);
    assert!(!store.exists(EntityKind::User, ali_id).await.unwrap());
    assert!(second.results.is_empty());
    assert!(store.list_results(&ResultFilter::default()).await.unwrap().is_empty());
    assert_eq!(second.modules.len(), 1);
    assert_eq!(second.groups.len(), 1);
    assert_references_resolve(&mut store, &second).await;
}

#[tokio::test]
async fn omitted_result_is_deleted_while_its_rows_survive() {
    let (mut store, admin) = store_with_admin().await;
    let (_, first) = sync(&mut store, &admin, cohort_payload()).await;
    let result = first.results[0].clone();

    let mut payload = serde_json::to_value(&first).unwrap();
    payload["results"] = json!([]);
    let (report, second) = sync(&mut store, &admin, payload).await;

    assert_eq!(report.results.deleted, 1);
    assert_eq!(report.users.deleted, 0);
    assert_eq!(report.modules.deleted, 0);
    assert!(second.results.is_empty());
    assert!(!store.exists(EntityKind::TestResult, result.id).await.unwrap());
    assert!(store.exists(EntityKind::User, result.participant_id).await.unwrap());
    assert!(store.exists(EntityKind::Module, result.module_id).await.unwrap());
    assert_references_resolve(&mut store, &second).await;
}

#[tokio::test]
async fn negative_time_taken_floors_at_zero() {
    let (mut store, admin) = store_with_admin().await;
    let mut payload = cohort_payload();
    payload["results"][0]["timeTaken"] = json!(-5);
    let (report, snapshot) = sync(&mut store, &admin, payload).await;

    assert_eq!(report.results.kept, 1);
    assert_eq!(snapshot.results[0].time_taken, Some(0));

    let mut echoed = serde_json::to_value(&snapshot).unwrap();
    echoed["results"][0]["timeTaken"] = json!("-30");
    let (_, second) = sync(&mut store, &admin, echoed).await;
    assert_eq!(second.results[0].id, snapshot.results[0].id);
    assert_eq!(second.results[0].time_taken, Some(0));
}

#[tokio::test]
async fn caller_survives_a_sync_that_omits_them() {
    let (mut store, admin) = store_with_admin().await;
    let (report, snapshot) = sync(&mut store, &admin, json!({ "users": [] })).await;

    assert_eq!(report.users.deleted, 0);
    assert!(store.exists(EntityKind::User, admin.id).await.unwrap());
    assert_eq!(snapshot.users.len(), 1);
    assert_eq!(snapshot.users[0].username, "admin");
}

#[tokio::test]
async fn new_row_with_known_username_updates_the_existing_account() {
    let (mut store, admin) = store_with_admin().await;
    let payload = json!({
        "users": [
            { "id": admin.id, "username": "admin", "role": "ADMIN" },
            { "id": "tmp-9", "username": "admin", "fullName": "Renamed", "role": "ADMIN", "password": "yangi" }
        ]
    });
    let (report, snapshot) = sync(&mut store, &admin, payload).await;

    assert_eq!(report.users.kept, 2);
    assert_eq!(snapshot.users.len(), 1);
    assert_eq!(snapshot.users[0].id, admin.id);
    assert_eq!(snapshot.users[0].full_name, "Renamed");
    let stored = store.find_user(admin.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash.as_deref(), Some("hashed:yangi"));
}

#[tokio::test]
async fn empty_password_keeps_the_stored_hash() {
    let (mut store, admin) = store_with_admin().await;
    let payload = json!({
        "users": [{ "id": admin.id, "username": "admin", "role": "ADMIN", "password": "" }]
    });
    sync(&mut store, &admin, payload).await;

    let stored = store.find_user(admin.id).await.unwrap().unwrap();
    assert_eq!(stored.password_hash.as_deref(), Some("hashed:123"));
}

#[tokio::test]
async fn malformed_rows_are_skipped_without_failing_the_sync() {
    let (mut store, admin) = store_with_admin().await;
    let payload = json!({
        "subjects": [{ "id": "s", "name": "Fan" }],
        "questions": [
            { "subjectId": "s", "text": "ok", "options": four("x"), "correctIndex": 2 },
            { "subjectId": "s", "text": "index", "options": four("y"), "correctIndex": 4 },
            { "subjectId": "s", "text": "shape", "options": "a,b,c,d" },
            { "subjectId": "other", "text": "orphan", "options": four("z") },
            "not an object"
        ],
        "users": [{ "id": "u", "fullName": "No username" }]
    });
    let (report, snapshot) = sync(&mut store, &admin, payload).await;

    assert_eq!(report.questions.kept, 1);
    assert_eq!(report.questions.skipped, 3);
    assert_eq!(report.users.skipped, 1);
    assert_eq!(snapshot.questions.len(), 1);
    assert_eq!(snapshot.questions[0].text, "ok");
}

#[tokio::test]
async fn module_update_keeps_settings_the_row_leaves_out() {
    let (mut store, admin) = store_with_admin().await;
    let (_, first) = sync(&mut store, &admin, cohort_payload()).await;
    let module_id = first.modules[0].id;

    let mut payload = serde_json::to_value(&first).unwrap();
    payload["modules"][0]["settings"] = json!({ "durationMinutes": 12 });
    let (_, second) = sync(&mut store, &admin, payload).await;

    let module = second.modules.iter().find(|m| m.id == module_id).unwrap();
    assert_eq!(module.settings.duration_minutes, 12);
    assert_eq!(module.settings.points_per_answer, 4);
    assert_eq!(module.settings.passing_score, 8);
}
