use std::collections::{BTreeSet, HashMap};

use sqlx::PgPool;

use crate::database::pg_store::PgStore;
use crate::database::store::{EntityStore, QuestionFilter, ResultFilter};
use crate::dto::snapshot_dto::{
    GroupView, ModuleView, QuestionView, ResultView, Snapshot, SubjectView, UserView,
};
use crate::error::Result;
use crate::models::group::Group;
use crate::models::module::{Module, ModuleGroupLink, ModuleSubjectConfig};
use crate::models::user::User;

#[derive(Clone)]
pub struct SnapshotService {
    pool: PgPool,
}

impl SnapshotService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn snapshot(&self, user: &User) -> Result<Snapshot> {
        let mut conn = self.pool.acquire().await?;
        project(&mut PgStore::new(&mut *conn), user).await
    }
}

/// Module links and subject-configs loaded once per projection.
struct Relations {
    links: Vec<ModuleGroupLink>,
    configs: HashMap<i64, Vec<ModuleSubjectConfig>>,
}

impl Relations {
    async fn load<S: EntityStore + ?Sized>(store: &mut S) -> Result<Self> {
        let links = store.module_group_links().await?;
        let mut configs: HashMap<i64, Vec<ModuleSubjectConfig>> = HashMap::new();
        for config in store.all_subject_configs().await? {
            configs.entry(config.module_id).or_default().push(config);
        }
        Ok(Self { links, configs })
    }

    fn group_ids(&self, module_id: i64) -> Vec<i64> {
        self.links
            .iter()
            .filter(|l| l.module_id == module_id)
            .map(|l| l.group_id)
            .collect()
    }

    fn module_ids(&self, group_id: i64) -> Vec<i64> {
        self.links
            .iter()
            .filter(|l| l.group_id == group_id)
            .map(|l| l.module_id)
            .collect()
    }

    fn configs(&self, module_id: i64) -> &[ModuleSubjectConfig] {
        self.configs.get(&module_id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn module_view(&self, module: &Module) -> ModuleView {
        ModuleView::new(module, self.group_ids(module.id), self.configs(module.id))
    }

    fn group_view(&self, group: &Group) -> GroupView {
        GroupView::new(group, self.module_ids(group.id))
    }
}

/// Builds the snapshot visible to `user`.
///
/// Staff get every row. Participants get their own account, their group, the active
/// modules assigned to that group, the subjects those modules draw from with their
/// questions, and their own results.
pub async fn project<S: EntityStore + ?Sized>(store: &mut S, user: &User) -> Result<Snapshot> {
    let relations = Relations::load(store).await?;
    if user.role().is_staff() {
        project_all(store, &relations).await
    } else {
        project_participant(store, &relations, user).await
    }
}

async fn project_all<S: EntityStore + ?Sized>(store: &mut S, relations: &Relations) -> Result<Snapshot> {
    let users = store.list_users(None).await?;
    let groups = store.list_groups(None).await?;

    let mut snapshot = Snapshot {
        users: users.iter().map(UserView::from).collect(),
        groups: groups.iter().map(|g| relations.group_view(g)).collect(),
        ..Snapshot::default()
    };

    for is_demo in [false, true] {
        let subjects: Vec<SubjectView> = store
            .list_subjects(Some(is_demo))
            .await?
            .iter()
            .map(SubjectView::from)
            .collect();
        let modules: Vec<ModuleView> = store
            .list_modules(Some(is_demo))
            .await?
            .iter()
            .map(|m| relations.module_view(m))
            .collect();
        let questions: Vec<QuestionView> = store
            .list_questions(&QuestionFilter {
                is_demo: Some(is_demo),
                ..QuestionFilter::default()
            })
            .await?
            .iter()
            .map(QuestionView::from)
            .collect();
        let results: Vec<ResultView> = store
            .list_results(&ResultFilter {
                participant_id: None,
                is_demo: Some(is_demo),
            })
            .await?
            .iter()
            .map(ResultView::from)
            .collect();

        if is_demo {
            snapshot.demo_subjects = subjects;
            snapshot.demo_modules = modules;
            snapshot.demo_questions = questions;
            snapshot.demo_results = results;
        } else {
            snapshot.subjects = subjects;
            snapshot.modules = modules;
            snapshot.questions = questions;
            snapshot.results = results;
        }
    }
    Ok(snapshot)
}

async fn project_participant<S: EntityStore + ?Sized>(
    store: &mut S,
    relations: &Relations,
    user: &User,
) -> Result<Snapshot> {
    let me = store.find_user(user.id).await?.unwrap_or_else(|| user.clone());

    let mut snapshot = Snapshot {
        users: vec![UserView::from(&me)],
        ..Snapshot::default()
    };

    let modules: Vec<Module> = match me.group_id {
        Some(group_id) => {
            if let Some(group) = store.find_group(group_id).await? {
                snapshot.groups.push(relations.group_view(&group));
            }
            store
                .list_modules(None)
                .await?
                .into_iter()
                .filter(|m| m.is_active && relations.group_ids(m.id).contains(&group_id))
                .collect()
        }
        None => Vec::new(),
    };

    let subject_ids: BTreeSet<i64> = modules
        .iter()
        .flat_map(|m| relations.configs(m.id).iter().map(|c| c.subject_id))
        .collect();

    for is_demo in [false, true] {
        let module_views: Vec<ModuleView> = modules
            .iter()
            .filter(|m| m.is_demo == is_demo)
            .map(|m| relations.module_view(m))
            .collect();
        let subjects: Vec<SubjectView> = store
            .list_subjects(Some(is_demo))
            .await?
            .iter()
            .filter(|s| subject_ids.contains(&s.id))
            .map(SubjectView::from)
            .collect();
        let questions: Vec<QuestionView> = store
            .list_questions(&QuestionFilter {
                is_demo: Some(is_demo),
                subject_id: None,
                subject_ids: Some(subjects.iter().map(|s| s.id).collect()),
            })
            .await?
            .iter()
            .map(QuestionView::from)
            .collect();
        let results: Vec<ResultView> = store
            .list_results(&ResultFilter {
                participant_id: Some(me.id),
                is_demo: Some(is_demo),
            })
            .await?
            .iter()
            .map(ResultView::from)
            .collect();

        if is_demo {
            snapshot.demo_subjects = subjects;
            snapshot.demo_modules = module_views;
            snapshot.demo_questions = questions;
            snapshot.demo_results = results;
        } else {
            snapshot.subjects = subjects;
            snapshot.modules = module_views;
            snapshot.questions = questions;
            snapshot.results = results;
        }
    }
    Ok(snapshot)
}
