//! Loosely typed rows of an incoming snapshot. Nothing in here fails on a bad field;
//! the reconciliation pass decides what to skip.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::utils::coerce::{loose_list, loose_object, ClientRef, LooseBool, LooseInt, LooseString};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotPayload {
    #[serde(deserialize_with = "loose_list")]
    pub users: Vec<UserRow>,
    #[serde(deserialize_with = "loose_list")]
    pub groups: Vec<GroupRow>,
    #[serde(deserialize_with = "loose_list")]
    pub subjects: Vec<SubjectRow>,
    #[serde(deserialize_with = "loose_list")]
    pub demo_subjects: Vec<SubjectRow>,
    #[serde(deserialize_with = "loose_list")]
    pub modules: Vec<ModuleRow>,
    #[serde(deserialize_with = "loose_list")]
    pub demo_modules: Vec<ModuleRow>,
    #[serde(deserialize_with = "loose_list")]
    pub questions: Vec<QuestionRow>,
    #[serde(deserialize_with = "loose_list")]
    pub demo_questions: Vec<QuestionRow>,
    #[serde(deserialize_with = "loose_list")]
    pub results: Vec<ResultRow>,
    #[serde(deserialize_with = "loose_list")]
    pub demo_results: Vec<ResultRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupRow {
    pub id: ClientRef,
    pub name: LooseString,
    pub is_archived: LooseBool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectRow {
    pub id: ClientRef,
    pub name: LooseString,
    pub is_demo: LooseBool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleRow {
    pub id: ClientRef,
    pub name: LooseString,
    pub is_demo: LooseBool,
    #[serde(deserialize_with = "loose_list")]
    pub group_ids: Vec<ClientRef>,
    #[serde(deserialize_with = "loose_list")]
    pub subject_configs: Vec<SubjectConfigRow>,
    #[serde(deserialize_with = "loose_object")]
    pub settings: SettingsRow,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsRow {
    pub points_per_answer: LooseInt,
    pub duration_minutes: LooseInt,
    pub passing_score: LooseInt,
    pub randomize: LooseBool,
    pub is_active: LooseBool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubjectConfigRow {
    pub subject_id: ClientRef,
    pub question_count: LooseInt,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionRow {
    pub id: ClientRef,
    pub subject_id: ClientRef,
    pub text: LooseString,
    /// Kept raw: anything but an array of exactly four entries drops the row.
    pub options: JsonValue,
    pub correct_index: LooseInt,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRow {
    pub id: ClientRef,
    pub username: LooseString,
    pub password: LooseString,
    pub full_name: LooseString,
    pub workplace: LooseString,
    pub role: LooseString,
    pub group_id: ClientRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultRow {
    pub id: ClientRef,
    pub participant_id: ClientRef,
    pub module_id: ClientRef,
    pub group_id: ClientRef,
    pub correct_answers: LooseInt,
    pub total_questions: LooseInt,
    pub score: LooseInt,
    pub is_passed: LooseBool,
    pub time_taken: LooseInt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tolerates_missing_and_malformed_sections() {
        let payload: SnapshotPayload = serde_json::from_value(json!({
            "groups": [{ "id": "tmp-1", "name": "A", "isArchived": "yes" }, 7],
            "modules": [{ "id": 3, "settings": null, "groupIds": "tmp-1" }],
            "questions": { "not": "a list" }
        }))
        .unwrap();

        assert_eq!(payload.groups.len(), 1);
        assert_eq!(payload.groups[0].id.token.as_deref(), Some("tmp-1"));
        assert!(payload.groups[0].is_archived.or(false));
        assert_eq!(payload.modules[0].id.id, Some(3));
        assert!(payload.modules[0].group_ids.is_empty());
        assert_eq!(payload.modules[0].settings.points_per_answer, LooseInt(None));
        assert!(payload.questions.is_empty());
        assert!(payload.users.is_empty());
    }
}
