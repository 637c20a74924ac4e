use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;

use crate::database::store::{EntityKind, EntityStore, QuestionFilter, ResultFilter};
use crate::error::{Error, Result};
use crate::models::group::{Group, GroupDraft};
use crate::models::module::{Module, ModuleDraft, ModuleGroupLink, ModuleSubjectConfig};
use crate::models::question::{Question, QuestionDraft};
use crate::models::subject::{Subject, SubjectDraft};
use crate::models::test_result::{TestResult, TestResultDraft};
use crate::models::user::{User, UserDraft};

/// In-process store with the same cascade rules as the Postgres schema.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    groups: BTreeMap<i64, Group>,
    subjects: BTreeMap<i64, Subject>,
    modules: BTreeMap<i64, Module>,
    questions: BTreeMap<i64, Question>,
    users: BTreeMap<i64, User>,
    results: BTreeMap<i64, TestResult>,
    links: Vec<ModuleGroupLink>,
    configs: Vec<ModuleSubjectConfig>,
    sequences: BTreeMap<&'static str, i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self, table: &'static str) -> i64 {
        let seq = self.sequences.entry(table).or_insert(0);
        *seq += 1;
        *seq
    }

    fn ids(&self, kind: EntityKind) -> Vec<i64> {
        match kind {
            EntityKind::Group => self.groups.keys().copied().collect(),
            EntityKind::Subject => self.subjects.keys().copied().collect(),
            EntityKind::Module => self.modules.keys().copied().collect(),
            EntityKind::Question => self.questions.keys().copied().collect(),
            EntityKind::User => self.users.keys().copied().collect(),
            EntityKind::TestResult => self.results.keys().copied().collect(),
        }
    }

    fn remove(&mut self, kind: EntityKind, id: i64) -> bool {
        match kind {
            EntityKind::Group => {
                let removed = self.groups.remove(&id).is_some();
                self.links.retain(|l| l.group_id != id);
                for user in self.users.values_mut().filter(|u| u.group_id == Some(id)) {
                    user.group_id = None;
                }
                for result in self.results.values_mut().filter(|r| r.group_id == Some(id)) {
                    result.group_id = None;
                }
                removed
            }
            EntityKind::Subject => {
                let removed = self.subjects.remove(&id).is_some();
                self.questions.retain(|_, q| q.subject_id != id);
                self.configs.retain(|c| c.subject_id != id);
                removed
            }
            EntityKind::Module => {
                let removed = self.modules.remove(&id).is_some();
                self.configs.retain(|c| c.module_id != id);
                self.links.retain(|l| l.module_id != id);
                self.results.retain(|_, r| r.module_id != id);
                removed
            }
            EntityKind::Question => self.questions.remove(&id).is_some(),
            EntityKind::User => {
                let removed = self.users.remove(&id).is_some();
                self.results.retain(|_, r| r.participant_id != id);
                removed
            }
            EntityKind::TestResult => self.results.remove(&id).is_some(),
        }
    }

    fn missing(kind: EntityKind, id: i64) -> Error {
        Error::NotFound(format!("{} {} not found", kind.table(), id))
    }

    /// Mirrors the `test_results.time_taken` CHECK constraint.
    fn check_time_taken(draft: &TestResultDraft) -> Result<()> {
        match draft.time_taken {
            Some(seconds) if seconds < 0 => Err(Error::Internal(format!(
                "test_results.time_taken must not be negative, got {}",
                seconds
            ))),
            _ => Ok(()),
        }
    }

    fn check_username(&self, username: &str, except: Option<i64>) -> Result<()> {
        let taken = self
            .users
            .values()
            .any(|u| u.username == username && Some(u.id) != except);
        if taken {
            return Err(Error::Conflict(format!("Username {} is already taken", username)));
        }
        Ok(())
    }
}

fn newest_first<T: Clone>(map: &BTreeMap<i64, T>, keep: impl Fn(&T) -> bool) -> Vec<T> {
    map.values().rev().filter(|v| keep(v)).cloned().collect()
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn exists(&mut self, kind: EntityKind, id: i64) -> Result<bool> {
        Ok(self.ids(kind).contains(&id))
    }

    async fn delete(&mut self, kind: EntityKind, id: i64) -> Result<bool> {
        Ok(self.remove(kind, id))
    }

    async fn delete_except(&mut self, kind: EntityKind, keep: &[i64]) -> Result<u64> {
        let doomed: Vec<i64> = self
            .ids(kind)
            .into_iter()
            .filter(|id| !keep.contains(id))
            .collect();
        let mut removed = 0;
        for id in doomed {
            if self.remove(kind, id) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn find_group(&mut self, id: i64) -> Result<Option<Group>> {
        Ok(self.groups.get(&id).cloned())
    }

    async fn insert_group(&mut self, draft: &GroupDraft) -> Result<Group> {
        let group = Group {
            id: self.next_id("groups"),
            name: draft.name.clone(),
            is_archived: draft.is_archived,
            created_at: Utc::now(),
        };
        self.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn update_group(&mut self, id: i64, draft: &GroupDraft) -> Result<Group> {
        let group = self
            .groups
            .get_mut(&id)
            .ok_or_else(|| Self::missing(EntityKind::Group, id))?;
        group.name = draft.name.clone();
        group.is_archived = draft.is_archived;
        Ok(group.clone())
    }

    async fn list_groups(&mut self, ids: Option<&[i64]>) -> Result<Vec<Group>> {
        Ok(newest_first(&self.groups, |g| {
            ids.map_or(true, |ids| ids.contains(&g.id))
        }))
    }

    async fn set_group_modules(&mut self, group_id: i64, module_ids: &[i64]) -> Result<()> {
        self.links.retain(|l| l.group_id != group_id);
        for module_id in module_ids {
            let link = ModuleGroupLink {
                module_id: *module_id,
                group_id,
            };
            if self.modules.contains_key(module_id) && !self.links.contains(&link) {
                self.links.push(link);
            }
        }
        Ok(())
    }

    async fn find_subject(&mut self, id: i64) -> Result<Option<Subject>> {
        Ok(self.subjects.get(&id).cloned())
    }

    async fn insert_subject(&mut self, draft: &SubjectDraft) -> Result<Subject> {
        let subject = Subject {
            id: self.next_id("subjects"),
            name: draft.name.clone(),
            is_demo: draft.is_demo,
        };
        self.subjects.insert(subject.id, subject.clone());
        Ok(subject)
    }

    async fn update_subject(&mut self, id: i64, draft: &SubjectDraft) -> Result<Subject> {
        let subject = self
            .subjects
            .get_mut(&id)
            .ok_or_else(|| Self::missing(EntityKind::Subject, id))?;
        subject.name = draft.name.clone();
        subject.is_demo = draft.is_demo;
        Ok(subject.clone())
    }

    async fn list_subjects(&mut self, is_demo: Option<bool>) -> Result<Vec<Subject>> {
        Ok(newest_first(&self.subjects, |s| {
            is_demo.map_or(true, |d| s.is_demo == d)
        }))
    }

    async fn find_module(&mut self, id: i64) -> Result<Option<Module>> {
        Ok(self.modules.get(&id).cloned())
    }

    async fn insert_module(&mut self, draft: &ModuleDraft) -> Result<Module> {
        let s = draft.settings;
        let module = Module {
            id: self.next_id("modules"),
            name: draft.name.clone(),
            is_demo: draft.is_demo,
            points_per_answer: s.points_per_answer,
            duration_minutes: s.duration_minutes,
            passing_score: s.passing_score,
            randomize: s.randomize,
            is_active: s.is_active,
        };
        self.modules.insert(module.id, module.clone());
        Ok(module)
    }

    async fn update_module(&mut self, id: i64, draft: &ModuleDraft) -> Result<Module> {
        let module = self
            .modules
            .get_mut(&id)
            .ok_or_else(|| Self::missing(EntityKind::Module, id))?;
        let s = draft.settings;
        module.name = draft.name.clone();
        module.is_demo = draft.is_demo;
        module.points_per_answer = s.points_per_answer;
        module.duration_minutes = s.duration_minutes;
        module.passing_score = s.passing_score;
        module.randomize = s.randomize;
        module.is_active = s.is_active;
        Ok(module.clone())
    }

    async fn list_modules(&mut self, is_demo: Option<bool>) -> Result<Vec<Module>> {
        Ok(newest_first(&self.modules, |m| {
            is_demo.map_or(true, |d| m.is_demo == d)
        }))
    }

    async fn set_module_groups(&mut self, module_id: i64, group_ids: &[i64]) -> Result<()> {
        self.links.retain(|l| l.module_id != module_id);
        for group_id in group_ids {
            let link = ModuleGroupLink {
                module_id,
                group_id: *group_id,
            };
            if self.groups.contains_key(group_id) && !self.links.contains(&link) {
                self.links.push(link);
            }
        }
        Ok(())
    }

    async fn module_group_links(&mut self) -> Result<Vec<ModuleGroupLink>> {
        let mut links = self.links.clone();
        links.sort_by_key(|l| (l.module_id, l.group_id));
        Ok(links)
    }

    async fn module_group_ids(&mut self, module_id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .links
            .iter()
            .filter(|l| l.module_id == module_id)
            .map(|l| l.group_id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn subject_configs(&mut self, module_id: i64) -> Result<Vec<ModuleSubjectConfig>> {
        let mut configs: Vec<_> = self
            .configs
            .iter()
            .filter(|c| c.module_id == module_id)
            .cloned()
            .collect();
        configs.sort_by_key(|c| c.id);
        Ok(configs)
    }

    async fn all_subject_configs(&mut self) -> Result<Vec<ModuleSubjectConfig>> {
        let mut configs = self.configs.clone();
        configs.sort_by_key(|c| (c.module_id, c.id));
        Ok(configs)
    }

    async fn replace_subject_configs(&mut self, module_id: i64, configs: &[(i64, i32)]) -> Result<()> {
        self.configs.retain(|c| c.module_id != module_id);
        for (subject_id, question_count) in configs {
            if !self.subjects.contains_key(subject_id) {
                return Err(Self::missing(EntityKind::Subject, *subject_id));
            }
            if self
                .configs
                .iter()
                .any(|c| c.module_id == module_id && c.subject_id == *subject_id)
            {
                return Err(Error::Conflict(format!(
                    "Subject {} is configured twice for module {}",
                    subject_id, module_id
                )));
            }
            let config = ModuleSubjectConfig {
                id: self.next_id("module_subject_configs"),
                module_id,
                subject_id: *subject_id,
                question_count: *question_count,
            };
            self.configs.push(config);
        }
        Ok(())
    }

    async fn find_question(&mut self, id: i64) -> Result<Option<Question>> {
        Ok(self.questions.get(&id).cloned())
    }

    async fn insert_question(&mut self, draft: &QuestionDraft) -> Result<Question> {
        if !self.subjects.contains_key(&draft.subject_id) {
            return Err(Self::missing(EntityKind::Subject, draft.subject_id));
        }
        let [a, b, c, d] = draft.options.clone();
        let question = Question {
            id: self.next_id("questions"),
            subject_id: draft.subject_id,
            text: draft.text.clone(),
            option_a: a,
            option_b: b,
            option_c: c,
            option_d: d,
            correct_index: draft.correct_index,
        };
        self.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn update_question(&mut self, id: i64, draft: &QuestionDraft) -> Result<Question> {
        if !self.subjects.contains_key(&draft.subject_id) {
            return Err(Self::missing(EntityKind::Subject, draft.subject_id));
        }
        let question = self
            .questions
            .get_mut(&id)
            .ok_or_else(|| Self::missing(EntityKind::Question, id))?;
        let [a, b, c, d] = draft.options.clone();
        question.subject_id = draft.subject_id;
        question.text = draft.text.clone();
        question.option_a = a;
        question.option_b = b;
        question.option_c = c;
        question.option_d = d;
        question.correct_index = draft.correct_index;
        Ok(question.clone())
    }

    async fn list_questions(&mut self, filter: &QuestionFilter) -> Result<Vec<Question>> {
        let subjects = &self.subjects;
        Ok(newest_first(&self.questions, |q| {
            let demo_ok = filter.is_demo.map_or(true, |d| {
                subjects.get(&q.subject_id).map_or(false, |s| s.is_demo == d)
            });
            let subject_ok = filter.subject_id.map_or(true, |id| q.subject_id == id);
            let subjects_ok = filter
                .subject_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&q.subject_id));
            demo_ok && subject_ok && subjects_ok
        }))
    }

    async fn questions_for_subject(&mut self, subject_id: i64) -> Result<Vec<Question>> {
        Ok(self
            .questions
            .values()
            .filter(|q| q.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn questions_in_subjects(&mut self, ids: &[i64], subject_ids: &[i64]) -> Result<Vec<Question>> {
        Ok(self
            .questions
            .values()
            .filter(|q| ids.contains(&q.id) && subject_ids.contains(&q.subject_id))
            .cloned()
            .collect())
    }

    async fn find_user(&mut self, id: i64) -> Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }

    async fn find_user_by_username(&mut self, username: &str) -> Result<Option<User>> {
        Ok(self.users.values().find(|u| u.username == username).cloned())
    }

    async fn insert_user(&mut self, draft: &UserDraft, password_hash: Option<&str>) -> Result<User> {
        self.check_username(&draft.username, None)?;
        let user = User {
            id: self.next_id("users"),
            username: draft.username.clone(),
            password_hash: password_hash.map(str::to_string),
            full_name: draft.full_name.clone(),
            workplace: draft.workplace.clone(),
            role: draft.role.as_str().to_string(),
            group_id: draft.group_id.filter(|g| self.groups.contains_key(g)),
            is_active: draft.is_active,
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&mut self, id: i64, draft: &UserDraft, password_hash: Option<&str>) -> Result<User> {
        self.check_username(&draft.username, Some(id))?;
        let group_id = draft.group_id.filter(|g| self.groups.contains_key(g));
        let user = self
            .users
            .get_mut(&id)
            .ok_or_else(|| Self::missing(EntityKind::User, id))?;
        user.username = draft.username.clone();
        if let Some(hash) = password_hash {
            user.password_hash = Some(hash.to_string());
        }
        user.full_name = draft.full_name.clone();
        user.workplace = draft.workplace.clone();
        user.role = draft.role.as_str().to_string();
        user.group_id = group_id;
        user.is_active = draft.is_active;
        Ok(user.clone())
    }

    async fn list_users(&mut self, ids: Option<&[i64]>) -> Result<Vec<User>> {
        Ok(newest_first(&self.users, |u| {
            ids.map_or(true, |ids| ids.contains(&u.id))
        }))
    }

    async fn lock_user(&mut self, _id: i64) -> Result<()> {
        Ok(())
    }

    async fn find_result(&mut self, id: i64) -> Result<Option<TestResult>> {
        Ok(self.results.get(&id).cloned())
    }

    async fn insert_result(&mut self, draft: &TestResultDraft) -> Result<TestResult> {
        Self::check_time_taken(draft)?;
        if !self.users.contains_key(&draft.participant_id) {
            return Err(Self::missing(EntityKind::User, draft.participant_id));
        }
        if !self.modules.contains_key(&draft.module_id) {
            return Err(Self::missing(EntityKind::Module, draft.module_id));
        }
        let result = TestResult {
            id: self.next_id("test_results"),
            participant_id: draft.participant_id,
            module_id: draft.module_id,
            group_id: draft.group_id.filter(|g| self.groups.contains_key(g)),
            correct_answers: draft.correct_answers,
            total_questions: draft.total_questions,
            score: draft.score,
            is_passed: draft.is_passed,
            date: Utc::now(),
            time_taken: draft.time_taken,
        };
        self.results.insert(result.id, result.clone());
        Ok(result)
    }

    async fn update_result(&mut self, id: i64, draft: &TestResultDraft) -> Result<TestResult> {
        Self::check_time_taken(draft)?;
        let group_id = draft.group_id.filter(|g| self.groups.contains_key(g));
        let result = self
            .results
            .get_mut(&id)
            .ok_or_else(|| Self::missing(EntityKind::TestResult, id))?;
        result.participant_id = draft.participant_id;
        result.module_id = draft.module_id;
        result.group_id = group_id;
        result.correct_answers = draft.correct_answers;
        result.total_questions = draft.total_questions;
        result.score = draft.score;
        result.is_passed = draft.is_passed;
        result.time_taken = draft.time_taken;
        Ok(result.clone())
    }

    async fn list_results(&mut self, filter: &ResultFilter) -> Result<Vec<TestResult>> {
        let modules = &self.modules;
        let mut results: Vec<TestResult> = self
            .results
            .values()
            .filter(|r| filter.participant_id.map_or(true, |p| r.participant_id == p))
            .filter(|r| {
                filter.is_demo.map_or(true, |d| {
                    modules.get(&r.module_id).map_or(false, |m| m.is_demo == d)
                })
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(results)
    }

    async fn count_attempts(&mut self, participant_id: i64, module_id: i64) -> Result<i64> {
        Ok(self
            .results
            .values()
            .filter(|r| r.participant_id == participant_id && r.module_id == module_id)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::module::ModuleSettings;
    use crate::models::user::Role;

    fn module_draft(name: &str) -> ModuleDraft {
        ModuleDraft {
            name: name.to_string(),
            is_demo: false,
            settings: ModuleSettings::default(),
        }
    }

    #[tokio::test]
    async fn deleting_a_subject_takes_its_questions_and_configs() {
        let mut store = MemoryStore::new();
        let subject = store
            .insert_subject(&SubjectDraft { name: "Math".into(), is_demo: false })
            .await
            .unwrap();
        let module = store.insert_module(&module_draft("M")).await.unwrap();
        store.replace_subject_configs(module.id, &[(subject.id, 2)]).await.unwrap();
        let draft = QuestionDraft::new(
            subject.id,
            "2+2".into(),
            vec!["1".into(), "2".into(), "3".into(), "4".into()],
            3,
        )
        .unwrap();
        store.insert_question(&draft).await.unwrap();

        assert!(store.delete(EntityKind::Subject, subject.id).await.unwrap());
        assert!(store.list_questions(&QuestionFilter::default()).await.unwrap().is_empty());
        assert!(store.subject_configs(module.id).await.unwrap().is_empty());
        assert!(store.exists(EntityKind::Module, module.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_group_detaches_members() {
        let mut store = MemoryStore::new();
        let group = store
            .insert_group(&GroupDraft { name: "G".into(), is_archived: false })
            .await
            .unwrap();
        let module = store.insert_module(&module_draft("M")).await.unwrap();
        store.set_module_groups(module.id, &[group.id]).await.unwrap();
        let user = store
            .insert_user(
                &UserDraft {
                    username: "ali".into(),
                    full_name: String::new(),
                    workplace: String::new(),
                    role: Role::Participant,
                    group_id: Some(group.id),
                    is_active: true,
                },
                None,
            )
            .await
            .unwrap();

        let removed = store.delete_except(EntityKind::Group, &[]).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.find_user(user.id).await.unwrap().unwrap().group_id, None);
        assert!(store.module_group_links().await.unwrap().is_empty());
        assert!(store.find_module(module.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn negative_time_taken_is_refused_like_the_schema() {
        let mut store = MemoryStore::new();
        let module = store.insert_module(&module_draft("M")).await.unwrap();
        let user = store
            .insert_user(
                &UserDraft {
                    username: "vali".into(),
                    full_name: String::new(),
                    workplace: String::new(),
                    role: Role::Participant,
                    group_id: None,
                    is_active: true,
                },
                None,
            )
            .await
            .unwrap();
        let mut draft = TestResultDraft {
            participant_id: user.id,
            module_id: module.id,
            time_taken: Some(-1),
            ..TestResultDraft::default()
        };

        assert!(matches!(store.insert_result(&draft).await, Err(Error::Internal(_))));
        assert!(store.list_results(&ResultFilter::default()).await.unwrap().is_empty());

        draft.time_taken = Some(0);
        let stored = store.insert_result(&draft).await.unwrap();
        draft.time_taken = Some(-7);
        assert!(store.update_result(stored.id, &draft).await.is_err());
        assert_eq!(store.find_result(stored.id).await.unwrap().unwrap().time_taken, Some(0));
    }
}
