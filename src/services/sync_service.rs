//! Snapshot reconciliation.
//!
//! A sync replaces the server's entity graph with a client-supplied one. Entity types are
//! processed parent-first so later rows can refer to earlier ones by whatever id the client
//! used; every type is then pruned to the ids that survived this call. Malformed rows are
//! skipped, store failures abort the whole transaction.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use sqlx::PgPool;

use crate::database::pg_store::PgStore;
use crate::database::store::{EntityKind, EntityStore};
use crate::dto::snapshot_dto::Snapshot;
use crate::dto::sync_dto::{ModuleRow, QuestionRow, SettingsRow, SnapshotPayload};
use crate::error::Result;
use crate::models::group::GroupDraft;
use crate::models::module::{ModuleDraft, ModuleSettings};
use crate::models::question::QuestionDraft;
use crate::models::subject::SubjectDraft;
use crate::models::test_result::TestResultDraft;
use crate::models::user::{Role, User, UserDraft};
use crate::services::snapshot_service::project;
use crate::utils::coerce::{clamp_i32, loose_text, ClientRef, LooseInt};
use crate::utils::crypto::hash_password;

pub type PasswordHasher = fn(&str) -> Result<String>;

/// Per-call settings of a reconciliation.
#[derive(Clone)]
pub struct SyncOptions {
    /// Account running the sync; never deleted by it.
    pub caller_id: i64,
    /// Password for users created without one.
    pub default_password: String,
    pub hash_password: PasswordHasher,
}

/// How a payload row maps onto the store, decided once per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIdentity {
    Existing(i64),
    New,
}

/// A row is existing only when its id parses as an integer and that row is stored.
pub async fn resolve_identity<S>(store: &mut S, kind: EntityKind, id: &ClientRef) -> Result<RowIdentity>
where
    S: EntityStore + ?Sized,
{
    match id.id {
        Some(id) if store.exists(kind, id).await? => Ok(RowIdentity::Existing(id)),
        _ => Ok(RowIdentity::New),
    }
}

/// Client token -> server id, filled as rows of one entity type are stored.
///
/// Both the token the client sent and the server id's own text resolve to the stored row,
/// so later rows may refer to it either way.
#[derive(Debug, Default)]
pub struct IdMap {
    ids: HashMap<String, i64>,
}

impl IdMap {
    pub fn record(&mut self, client: &ClientRef, server_id: i64) {
        if let Some(token) = &client.token {
            self.ids.insert(token.clone(), server_id);
        }
        self.ids.insert(server_id.to_string(), server_id);
    }

    pub fn resolve(&self, reference: &ClientRef) -> Option<i64> {
        reference
            .token
            .as_ref()
            .and_then(|token| self.ids.get(token))
            .copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub kept: usize,
    pub skipped: usize,
    pub deleted: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub groups: Tally,
    pub subjects: Tally,
    pub modules: Tally,
    pub questions: Tally,
    pub users: Tally,
    pub results: Tally,
    /// Subject-config entries dropped because their subject did not resolve.
    pub configs_skipped: usize,
}

impl SyncReport {
    fn log(&self, caller_id: i64) {
        tracing::info!(
            caller_id,
            groups = ?self.groups,
            subjects = ?self.subjects,
            modules = ?self.modules,
            questions = ?self.questions,
            users = ?self.users,
            results = ?self.results,
            configs_skipped = self.configs_skipped,
            "snapshot sync applied"
        );
    }
}

#[derive(Clone)]
pub struct SyncService {
    pool: PgPool,
    default_password: String,
}

impl SyncService {
    pub fn new(pool: PgPool, default_password: String) -> Self {
        Self {
            pool,
            default_password,
        }
    }

    /// Applies `payload` in one transaction and returns the caller's refreshed snapshot.
    pub async fn sync(&self, caller: &User, payload: &SnapshotPayload) -> Result<Snapshot> {
        let options = SyncOptions {
            caller_id: caller.id,
            default_password: self.default_password.clone(),
            hash_password,
        };

        let mut tx = self.pool.begin().await?;
        let mut store = PgStore::new(&mut *tx);
        let report = reconcile(&mut store, payload, &options).await?;
        let snapshot = project(&mut store, caller).await?;
        drop(store);
        tx.commit().await?;

        report.log(caller.id);
        Ok(snapshot)
    }
}

/// Runs every reconciliation step against `store`. The caller owns the transaction.
pub async fn reconcile<S>(store: &mut S, payload: &SnapshotPayload, options: &SyncOptions) -> Result<SyncReport>
where
    S: EntityStore + ?Sized,
{
    let mut report = SyncReport::default();

    let groups = sync_groups(store, payload, &mut report.groups).await?;
    let subjects = sync_subjects(store, payload, &mut report.subjects).await?;
    let modules = sync_modules(store, payload, &groups, &subjects, &mut report).await?;
    sync_questions(store, payload, &subjects, &mut report.questions).await?;
    let users = sync_users(store, payload, &groups, options, &mut report.users).await?;
    sync_results(store, payload, &users, &modules, &groups, &mut report.results).await?;

    Ok(report)
}

async fn sync_groups<S>(store: &mut S, payload: &SnapshotPayload, tally: &mut Tally) -> Result<IdMap>
where
    S: EntityStore + ?Sized,
{
    let mut map = IdMap::default();
    let mut kept = Vec::with_capacity(payload.groups.len());

    for row in &payload.groups {
        let draft = GroupDraft {
            name: row.name.or_empty(),
            is_archived: row.is_archived.or(false),
        };
        let group = match resolve_identity(store, EntityKind::Group, &row.id).await? {
            RowIdentity::Existing(id) => store.update_group(id, &draft).await?,
            RowIdentity::New => store.insert_group(&draft).await?,
        };
        map.record(&row.id, group.id);
        kept.push(group.id);
    }

    tally.kept = kept.len();
    tally.deleted = store.delete_except(EntityKind::Group, &kept).await?;
    Ok(map)
}

async fn sync_subjects<S>(store: &mut S, payload: &SnapshotPayload, tally: &mut Tally) -> Result<IdMap>
where
    S: EntityStore + ?Sized,
{
    let mut map = IdMap::default();
    let mut kept = Vec::new();
    let rows = payload
        .subjects
        .iter()
        .map(|row| (row, false))
        .chain(payload.demo_subjects.iter().map(|row| (row, true)));

    for (row, demo_partition) in rows {
        let draft = SubjectDraft {
            name: row.name.or_empty(),
            is_demo: demo_partition || row.is_demo.or(false),
        };
        let subject = match resolve_identity(store, EntityKind::Subject, &row.id).await? {
            RowIdentity::Existing(id) => store.update_subject(id, &draft).await?,
            RowIdentity::New => store.insert_subject(&draft).await?,
        };
        map.record(&row.id, subject.id);
        kept.push(subject.id);
    }

    tally.kept = kept.len();
    tally.deleted = store.delete_except(EntityKind::Subject, &kept).await?;
    Ok(map)
}

/// Settings of a module row, falling back per key to `base`. Negative numbers floor at 0.
fn merge_settings(row: &SettingsRow, base: ModuleSettings) -> ModuleSettings {
    let number = |value: LooseInt, fallback: i32| value.0.map(clamp_i32).unwrap_or(fallback).max(0);
    ModuleSettings {
        points_per_answer: number(row.points_per_answer, base.points_per_answer),
        duration_minutes: number(row.duration_minutes, base.duration_minutes),
        passing_score: number(row.passing_score, base.passing_score),
        randomize: row.randomize.or(base.randomize),
        is_active: row.is_active.or(base.is_active),
    }
}

async fn sync_modules<S>(
    store: &mut S,
    payload: &SnapshotPayload,
    groups: &IdMap,
    subjects: &IdMap,
    report: &mut SyncReport,
) -> Result<IdMap>
where
    S: EntityStore + ?Sized,
{
    let mut map = IdMap::default();
    let mut kept: Vec<(i64, &ModuleRow)> = Vec::new();
    let rows = payload
        .modules
        .iter()
        .map(|row| (row, false))
        .chain(payload.demo_modules.iter().map(|row| (row, true)));

    for (row, demo_partition) in rows {
        let identity = resolve_identity(store, EntityKind::Module, &row.id).await?;
        let base = match identity {
            RowIdentity::Existing(id) => store.find_module(id).await?.map(|m| m.settings()),
            RowIdentity::New => None,
        }
        .unwrap_or_default();

        let draft = ModuleDraft {
            name: row.name.or_empty(),
            is_demo: demo_partition || row.is_demo.or(false),
            settings: merge_settings(&row.settings, base),
        };
        let module = match identity {
            RowIdentity::Existing(id) => store.update_module(id, &draft).await?,
            RowIdentity::New => store.insert_module(&draft).await?,
        };
        map.record(&row.id, module.id);
        kept.push((module.id, row));
    }

    let kept_ids: Vec<i64> = kept.iter().map(|(id, _)| *id).collect();
    report.modules.kept = kept_ids.len();
    report.modules.deleted = store.delete_except(EntityKind::Module, &kept_ids).await?;

    for (module_id, row) in &kept {
        let mut group_ids: Vec<i64> = Vec::new();
        for group_id in row.group_ids.iter().filter_map(|r| groups.resolve(r)) {
            if !group_ids.contains(&group_id) {
                group_ids.push(group_id);
            }
        }
        store.set_module_groups(*module_id, &group_ids).await?;

        let mut configs: Vec<(i64, i32)> = Vec::new();
        for config in &row.subject_configs {
            let Some(subject_id) = subjects.resolve(&config.subject_id) else {
                report.configs_skipped += 1;
                continue;
            };
            if configs.iter().any(|(seen, _)| *seen == subject_id) {
                continue;
            }
            configs.push((subject_id, clamp_i32(config.question_count.or(0).max(0))));
        }
        store.replace_subject_configs(*module_id, &configs).await?;
    }

    Ok(map)
}

/// A stored draft for a question row, or `None` when the row has to be skipped.
fn question_draft(row: &QuestionRow, subjects: &IdMap) -> Option<QuestionDraft> {
    let subject_id = subjects.resolve(&row.subject_id)?;
    let options = match &row.options {
        JsonValue::Array(items) => items.iter().map(loose_text).collect(),
        _ => return None,
    };
    QuestionDraft::new(subject_id, row.text.or_empty(), options, row.correct_index.or(0))
}

async fn sync_questions<S>(store: &mut S, payload: &SnapshotPayload, subjects: &IdMap, tally: &mut Tally) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    let mut kept = Vec::new();

    for row in payload.questions.iter().chain(payload.demo_questions.iter()) {
        let Some(draft) = question_draft(row, subjects) else {
            tally.skipped += 1;
            continue;
        };
        let question = match resolve_identity(store, EntityKind::Question, &row.id).await? {
            RowIdentity::Existing(id) => store.update_question(id, &draft).await?,
            RowIdentity::New => store.insert_question(&draft).await?,
        };
        kept.push(question.id);
    }

    tally.kept = kept.len();
    tally.deleted = store.delete_except(EntityKind::Question, &kept).await?;
    Ok(())
}

async fn sync_users<S>(
    store: &mut S,
    payload: &SnapshotPayload,
    groups: &IdMap,
    options: &SyncOptions,
    tally: &mut Tally,
) -> Result<IdMap>
where
    S: EntityStore + ?Sized,
{
    let mut map = IdMap::default();
    let mut kept = Vec::new();

    for row in &payload.users {
        let draft = UserDraft {
            username: row.username.or_empty().trim().to_string(),
            full_name: row.full_name.or_empty(),
            workplace: row.workplace.or_empty(),
            role: row
                .role
                .0
                .as_deref()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(Role::Participant),
            group_id: groups.resolve(&row.group_id),
            is_active: true,
        };
        let password = row.password.0.as_deref().filter(|p| !p.is_empty());

        let existing = match resolve_identity(store, EntityKind::User, &row.id).await? {
            RowIdentity::Existing(id) => Some(id),
            RowIdentity::New if !draft.username.is_empty() => store
                .find_user_by_username(&draft.username)
                .await?
                .map(|u| u.id),
            RowIdentity::New => None,
        };

        let user = match existing {
            Some(id) => {
                let hash = password.map(options.hash_password).transpose()?;
                store.update_user(id, &draft, hash.as_deref()).await?
            }
            None if draft.username.is_empty() => {
                tally.skipped += 1;
                continue;
            }
            None => {
                let hash = (options.hash_password)(password.unwrap_or(options.default_password.as_str()))?;
                store.insert_user(&draft, Some(&hash)).await?
            }
        };
        map.record(&row.id, user.id);
        kept.push(user.id);
    }

    tally.kept = kept.len();
    if !kept.contains(&options.caller_id) {
        kept.push(options.caller_id);
    }
    tally.deleted = store.delete_except(EntityKind::User, &kept).await?;
    Ok(map)
}

/// Resolves a reference through the in-call map first, then by stored id.
async fn resolve_reference<S>(store: &mut S, kind: EntityKind, map: &IdMap, reference: &ClientRef) -> Result<Option<i64>>
where
    S: EntityStore + ?Sized,
{
    if let Some(id) = map.resolve(reference) {
        return Ok(Some(id));
    }
    match reference.id {
        Some(id) if store.exists(kind, id).await? => Ok(Some(id)),
        _ => Ok(None),
    }
}

async fn sync_results<S>(
    store: &mut S,
    payload: &SnapshotPayload,
    users: &IdMap,
    modules: &IdMap,
    groups: &IdMap,
    tally: &mut Tally,
) -> Result<()>
where
    S: EntityStore + ?Sized,
{
    let mut kept = Vec::new();

    for row in payload.results.iter().chain(payload.demo_results.iter()) {
        let participant = resolve_reference(store, EntityKind::User, users, &row.participant_id).await?;
        let module = resolve_reference(store, EntityKind::Module, modules, &row.module_id).await?;
        let (Some(participant_id), Some(module_id)) = (participant, module) else {
            tally.skipped += 1;
            continue;
        };
        let group_id = resolve_reference(store, EntityKind::Group, groups, &row.group_id).await?;

        let draft = TestResultDraft {
            participant_id,
            module_id,
            group_id,
            correct_answers: clamp_i32(row.correct_answers.or(0).max(0)),
            total_questions: clamp_i32(row.total_questions.or(0).max(0)),
            score: clamp_i32(row.score.or(0).max(0)),
            is_passed: row.is_passed.or(false),
            time_taken: row.time_taken.0.map(|t| clamp_i32(t).max(0)),
        };
        let result = match resolve_identity(store, EntityKind::TestResult, &row.id).await? {
            RowIdentity::Existing(id) => store.update_result(id, &draft).await?,
            RowIdentity::New => store.insert_result(&draft).await?,
        };
        kept.push(result.id);
    }

    tally.kept = kept.len();
    tally.deleted = store.delete_except(EntityKind::TestResult, &kept).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_map_resolves_client_token_and_server_id() {
        let mut map = IdMap::default();
        map.record(&ClientRef::from_value(&json!("tmp-7")), 41);

        assert_eq!(map.resolve(&ClientRef::from_value(&json!("tmp-7"))), Some(41));
        assert_eq!(map.resolve(&ClientRef::from_value(&json!(41))), Some(41));
        assert_eq!(map.resolve(&ClientRef::from_value(&json!("41"))), Some(41));
        assert_eq!(map.resolve(&ClientRef::from_value(&json!(null))), None);
        assert_eq!(map.resolve(&ClientRef::from_value(&json!("tmp-8"))), None);
    }

    #[test]
    fn missing_settings_fall_back_per_key() {
        let base = ModuleSettings {
            points_per_answer: 2,
            duration_minutes: 45,
            passing_score: 10,
            randomize: false,
            is_active: false,
        };
        let row: SettingsRow = serde_json::from_value(json!({
            "pointsPerAnswer": "7",
            "passingScore": -3,
            "isActive": "yes"
        }))
        .unwrap();

        let merged = merge_settings(&row, base);
        assert_eq!(merged.points_per_answer, 7);
        assert_eq!(merged.duration_minutes, 45);
        assert_eq!(merged.passing_score, 0);
        assert!(!merged.randomize);
        assert!(merged.is_active);
    }
}
