use sqlx::PgPool;

use crate::database::pg_store::PgStore;
use crate::database::store::{EntityKind, EntityStore, QuestionFilter, ResultFilter};
use crate::dto::catalog_dto::{
    CreateGroupPayload, CreateModulePayload, CreateQuestionPayload, CreateSubjectPayload,
    SettingsInput, SubjectConfigInput, UpdateGroupPayload, UpdateModulePayload,
    UpdateQuestionPayload, UpdateSubjectPayload,
};
use crate::dto::snapshot_dto::{GroupView, ModuleView, QuestionView, ResultView, SubjectView};
use crate::error::{Error, Result};
use crate::models::group::{Group, GroupDraft};
use crate::models::module::{Module, ModuleDraft, ModuleSettings};
use crate::models::question::QuestionDraft;
use crate::models::subject::SubjectDraft;
use crate::models::user::User;

/// Administrative CRUD over groups, subjects, modules and questions, plus scoped result reads.
#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
}

async fn group_view<S: EntityStore + ?Sized>(store: &mut S, group: &Group) -> Result<GroupView> {
    let module_ids = store
        .module_group_links()
        .await?
        .into_iter()
        .filter(|l| l.group_id == group.id)
        .map(|l| l.module_id)
        .collect();
    Ok(GroupView::new(group, module_ids))
}

async fn module_view<S: EntityStore + ?Sized>(store: &mut S, module: &Module) -> Result<ModuleView> {
    let group_ids = store.module_group_ids(module.id).await?;
    let configs = store.subject_configs(module.id).await?;
    Ok(ModuleView::new(module, group_ids, &configs))
}

async fn ensure_all_exist<S: EntityStore + ?Sized>(store: &mut S, kind: EntityKind, ids: &[i64]) -> Result<()> {
    for id in ids {
        if !store.exists(kind, *id).await? {
            return Err(Error::BadRequest(format!(
                "Invalid pk \"{}\" - object does not exist.",
                id
            )));
        }
    }
    Ok(())
}

fn merge_settings(input: Option<&SettingsInput>, base: ModuleSettings) -> ModuleSettings {
    let Some(input) = input else {
        return base;
    };
    ModuleSettings {
        points_per_answer: input.points_per_answer.unwrap_or(base.points_per_answer),
        duration_minutes: input.duration_minutes.unwrap_or(base.duration_minutes),
        passing_score: input.passing_score.unwrap_or(base.passing_score),
        randomize: input.randomize.unwrap_or(base.randomize),
        is_active: input.is_active.unwrap_or(base.is_active),
    }
}

async fn write_module_relations<S: EntityStore + ?Sized>(
    store: &mut S,
    module_id: i64,
    group_ids: Option<&[i64]>,
    configs: Option<&[SubjectConfigInput]>,
) -> Result<()> {
    if let Some(group_ids) = group_ids {
        ensure_all_exist(store, EntityKind::Group, group_ids).await?;
        store.set_module_groups(module_id, group_ids).await?;
    }
    if let Some(configs) = configs {
        let mut pairs: Vec<(i64, i32)> = Vec::with_capacity(configs.len());
        for config in configs {
            if pairs.iter().any(|(seen, _)| *seen == config.subject_id) {
                return Err(Error::BadRequest(format!(
                    "Subject {} is configured more than once",
                    config.subject_id
                )));
            }
            pairs.push((config.subject_id, config.question_count.max(0)));
        }
        let subject_ids: Vec<i64> = pairs.iter().map(|(id, _)| *id).collect();
        ensure_all_exist(store, EntityKind::Subject, &subject_ids).await?;
        store.replace_subject_configs(module_id, &pairs).await?;
    }
    Ok(())
}

fn not_found(what: &str) -> Error {
    Error::NotFound(format!("{} not found", what))
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_groups(&self) -> Result<Vec<GroupView>> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let links = store.module_group_links().await?;
        let groups = store.list_groups(None).await?;
        Ok(groups
            .iter()
            .map(|g| {
                let module_ids = links
                    .iter()
                    .filter(|l| l.group_id == g.id)
                    .map(|l| l.module_id)
                    .collect();
                GroupView::new(g, module_ids)
            })
            .collect())
    }

    pub async fn get_group(&self, id: i64) -> Result<GroupView> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let group = store.find_group(id).await?.ok_or_else(|| not_found("Group"))?;
        group_view(&mut store, &group).await
    }

    pub async fn create_group(&self, payload: CreateGroupPayload) -> Result<GroupView> {
        let mut tx = self.pool.begin().await?;
        let mut store = PgStore::new(&mut *tx);
        let group = store
            .insert_group(&GroupDraft {
                name: payload.name,
                is_archived: payload.is_archived.unwrap_or(false),
            })
            .await?;
        if let Some(module_ids) = &payload.module_ids {
            ensure_all_exist(&mut store, EntityKind::Module, module_ids).await?;
            store.set_group_modules(group.id, module_ids).await?;
        }
        let view = group_view(&mut store, &group).await?;
        tx.commit().await?;
        Ok(view)
    }

    pub async fn update_group(&self, id: i64, payload: UpdateGroupPayload) -> Result<GroupView> {
        let mut tx = self.pool.begin().await?;
        let mut store = PgStore::new(&mut *tx);
        let current = store.find_group(id).await?.ok_or_else(|| not_found("Group"))?;
        let group = store
            .update_group(
                id,
                &GroupDraft {
                    name: payload.name.unwrap_or(current.name),
                    is_archived: payload.is_archived.unwrap_or(current.is_archived),
                },
            )
            .await?;
        if let Some(module_ids) = &payload.module_ids {
            ensure_all_exist(&mut store, EntityKind::Module, module_ids).await?;
            store.set_group_modules(group.id, module_ids).await?;
        }
        let view = group_view(&mut store, &group).await?;
        tx.commit().await?;
        Ok(view)
    }

    pub async fn delete_group(&self, id: i64) -> Result<()> {
        self.delete(EntityKind::Group, id, "Group").await
    }

    pub async fn list_subjects(&self, is_demo: Option<bool>) -> Result<Vec<SubjectView>> {
        let mut conn = self.pool.acquire().await?;
        let subjects = PgStore::new(&mut *conn).list_subjects(is_demo).await?;
        Ok(subjects.iter().map(SubjectView::from).collect())
    }

    pub async fn get_subject(&self, id: i64) -> Result<SubjectView> {
        let mut conn = self.pool.acquire().await?;
        let subject = PgStore::new(&mut *conn)
            .find_subject(id)
            .await?
            .ok_or_else(|| not_found("Subject"))?;
        Ok(SubjectView::from(&subject))
    }

    /// `demo_override` comes from the `?is_demo=` query flag and wins over the body.
    pub async fn create_subject(&self, payload: CreateSubjectPayload, demo_override: Option<bool>) -> Result<SubjectView> {
        let mut conn = self.pool.acquire().await?;
        let subject = PgStore::new(&mut *conn)
            .insert_subject(&SubjectDraft {
                name: payload.name,
                is_demo: demo_override.or(payload.is_demo).unwrap_or(false),
            })
            .await?;
        Ok(SubjectView::from(&subject))
    }

    pub async fn update_subject(&self, id: i64, payload: UpdateSubjectPayload) -> Result<SubjectView> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let current = store.find_subject(id).await?.ok_or_else(|| not_found("Subject"))?;
        let subject = store
            .update_subject(
                id,
                &SubjectDraft {
                    name: payload.name.unwrap_or(current.name),
                    is_demo: payload.is_demo.unwrap_or(current.is_demo),
                },
            )
            .await?;
        Ok(SubjectView::from(&subject))
    }

    pub async fn delete_subject(&self, id: i64) -> Result<()> {
        self.delete(EntityKind::Subject, id, "Subject").await
    }

    pub async fn list_modules(&self, is_demo: Option<bool>) -> Result<Vec<ModuleView>> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let modules = store.list_modules(is_demo).await?;
        let mut views = Vec::with_capacity(modules.len());
        for module in &modules {
            views.push(module_view(&mut store, module).await?);
        }
        Ok(views)
    }

    pub async fn get_module(&self, id: i64) -> Result<ModuleView> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let module = store.find_module(id).await?.ok_or_else(|| not_found("Module"))?;
        module_view(&mut store, &module).await
    }

    pub async fn create_module(&self, payload: CreateModulePayload, demo_override: Option<bool>) -> Result<ModuleView> {
        let mut tx = self.pool.begin().await?;
        let mut store = PgStore::new(&mut *tx);
        let module = store
            .insert_module(&ModuleDraft {
                name: payload.name,
                is_demo: demo_override.or(payload.is_demo).unwrap_or(false),
                settings: merge_settings(payload.settings.as_ref(), ModuleSettings::default()),
            })
            .await?;
        write_module_relations(
            &mut store,
            module.id,
            payload.group_ids.as_deref(),
            payload.subject_configs.as_deref(),
        )
        .await?;
        let view = module_view(&mut store, &module).await?;
        tx.commit().await?;
        Ok(view)
    }

    /// Missing keys keep their stored values; `groupIds` and `subjectConfigs` replace the
    /// module's links wholesale when present.
    pub async fn update_module(&self, id: i64, payload: UpdateModulePayload) -> Result<ModuleView> {
        let mut tx = self.pool.begin().await?;
        let mut store = PgStore::new(&mut *tx);
        let current = store.find_module(id).await?.ok_or_else(|| not_found("Module"))?;
        let settings = merge_settings(payload.settings.as_ref(), current.settings());
        let module = store
            .update_module(
                id,
                &ModuleDraft {
                    name: payload.name.unwrap_or(current.name),
                    is_demo: payload.is_demo.unwrap_or(current.is_demo),
                    settings,
                },
            )
            .await?;
        write_module_relations(
            &mut store,
            module.id,
            payload.group_ids.as_deref(),
            payload.subject_configs.as_deref(),
        )
        .await?;
        let view = module_view(&mut store, &module).await?;
        tx.commit().await?;
        Ok(view)
    }

    pub async fn delete_module(&self, id: i64) -> Result<()> {
        self.delete(EntityKind::Module, id, "Module").await
    }

    pub async fn list_questions(&self, filter: QuestionFilter) -> Result<Vec<QuestionView>> {
        let mut conn = self.pool.acquire().await?;
        let questions = PgStore::new(&mut *conn).list_questions(&filter).await?;
        Ok(questions.iter().map(QuestionView::from).collect())
    }

    pub async fn get_question(&self, id: i64) -> Result<QuestionView> {
        let mut conn = self.pool.acquire().await?;
        let question = PgStore::new(&mut *conn)
            .find_question(id)
            .await?
            .ok_or_else(|| not_found("Question"))?;
        Ok(QuestionView::from(&question))
    }

    pub async fn create_question(&self, payload: CreateQuestionPayload) -> Result<QuestionView> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        ensure_all_exist(&mut store, EntityKind::Subject, &[payload.subject_id]).await?;
        let draft = QuestionDraft::new(
            payload.subject_id,
            payload.text,
            payload.options,
            payload.correct_index,
        )
        .ok_or_else(|| {
            Error::BadRequest("A question needs 4 options and a correctIndex of 0-3".to_string())
        })?;
        let question = store.insert_question(&draft).await?;
        Ok(QuestionView::from(&question))
    }

    pub async fn update_question(&self, id: i64, payload: UpdateQuestionPayload) -> Result<QuestionView> {
        let mut conn = self.pool.acquire().await?;
        let mut store = PgStore::new(&mut *conn);
        let current = store.find_question(id).await?.ok_or_else(|| not_found("Question"))?;
        let subject_id = payload.subject_id.unwrap_or(current.subject_id);
        ensure_all_exist(&mut store, EntityKind::Subject, &[subject_id]).await?;
        let draft = QuestionDraft::new(
            subject_id,
            payload.text.unwrap_or_else(|| current.text.clone()),
            payload.options.unwrap_or_else(|| current.options()),
            payload
                .correct_index
                .unwrap_or(i64::from(current.correct_index)),
        )
        .ok_or_else(|| {
            Error::BadRequest("A question needs 4 options and a correctIndex of 0-3".to_string())
        })?;
        let question = store.update_question(id, &draft).await?;
        Ok(QuestionView::from(&question))
    }

    pub async fn delete_question(&self, id: i64) -> Result<()> {
        self.delete(EntityKind::Question, id, "Question").await
    }

    /// Staff see every result, participants only their own; newest first.
    pub async fn list_results(&self, viewer: &User) -> Result<Vec<ResultView>> {
        let mut conn = self.pool.acquire().await?;
        let filter = ResultFilter {
            participant_id: (!viewer.role().is_staff()).then_some(viewer.id),
            is_demo: None,
        };
        let results = PgStore::new(&mut *conn).list_results(&filter).await?;
        Ok(results.iter().map(ResultView::from).collect())
    }

    pub async fn get_result(&self, viewer: &User, id: i64) -> Result<ResultView> {
        let mut conn = self.pool.acquire().await?;
        let result = PgStore::new(&mut *conn)
            .find_result(id)
            .await?
            .filter(|r| viewer.role().is_staff() || r.participant_id == viewer.id)
            .ok_or_else(|| not_found("Result"))?;
        Ok(ResultView::from(&result))
    }

    async fn delete(&self, kind: EntityKind, id: i64, what: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        if PgStore::new(&mut *conn).delete(kind, id).await? {
            tracing::info!(table = kind.table(), id, "row deleted");
            Ok(())
        } else {
            Err(not_found(what))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_store::MemoryStore;

    async fn module(store: &mut MemoryStore) -> Module {
        store
            .insert_module(&ModuleDraft {
                name: "Kompozitsiya".into(),
                is_demo: false,
                settings: ModuleSettings::default(),
            })
            .await
            .unwrap()
    }

    fn config(subject_id: i64, question_count: i32) -> SubjectConfigInput {
        SubjectConfigInput {
            subject_id,
            question_count,
        }
    }

    #[tokio::test]
    async fn relations_reject_unknown_ids_and_repeated_subjects() {
        let mut store = MemoryStore::new();
        let module = module(&mut store).await;
        let subject = store
            .insert_subject(&SubjectDraft { name: "Fan".into(), is_demo: false })
            .await
            .unwrap();

        let unknown_group = write_module_relations(&mut store, module.id, Some(&[77]), None).await;
        assert!(matches!(unknown_group, Err(Error::BadRequest(_))));

        let repeated = [config(subject.id, 2), config(subject.id, 3)];
        let result = write_module_relations(&mut store, module.id, None, Some(&repeated)).await;
        assert!(matches!(result, Err(Error::BadRequest(_))));

        let negative = [config(subject.id, -4)];
        write_module_relations(&mut store, module.id, None, Some(&negative))
            .await
            .unwrap();
        let stored = store.subject_configs(module.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].question_count, 0);
    }

    #[test]
    fn settings_input_overrides_only_given_keys() {
        let input = SettingsInput {
            duration_minutes: Some(15),
            randomize: Some(false),
            ..SettingsInput::default()
        };
        let merged = merge_settings(Some(&input), ModuleSettings::default());
        assert_eq!(merged.duration_minutes, 15);
        assert!(!merged.randomize);
        assert_eq!(merged.points_per_answer, 5);
        assert_eq!(merged.passing_score, 60);
        assert_eq!(merge_settings(None, merged), merged);
    }
}
