use serde::Deserialize;
use validator::Validate;

use crate::models::user::Role;
use crate::utils::coerce::explicit_null;

/// `?is_demo=` and `?subject_id=` filters shared by the catalog lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogQuery {
    pub is_demo: Option<String>,
    pub subject_id: Option<i64>,
}

impl CatalogQuery {
    /// Truthy when the raw flag is one of `1`, `true`, `yes` (case-insensitive).
    pub fn demo_flag(&self) -> Option<bool> {
        self.is_demo
            .as_deref()
            .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupPayload {
    #[validate(length(min = 1))]
    pub name: String,
    pub is_archived: Option<bool>,
    pub module_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupPayload {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub is_archived: Option<bool>,
    pub module_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubjectPayload {
    #[validate(length(min = 1))]
    pub name: String,
    pub is_demo: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubjectPayload {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub is_demo: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SettingsInput {
    #[validate(range(min = 0))]
    pub points_per_answer: Option<i32>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0))]
    pub passing_score: Option<i32>,
    pub randomize: Option<bool>,
    pub is_active: Option<bool>,
}

/// Negative counts are floored at zero when stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectConfigInput {
    pub subject_id: i64,
    pub question_count: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateModulePayload {
    #[validate(length(min = 1))]
    pub name: String,
    pub is_demo: Option<bool>,
    pub group_ids: Option<Vec<i64>>,
    pub subject_configs: Option<Vec<SubjectConfigInput>>,
    #[validate(nested)]
    pub settings: Option<SettingsInput>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModulePayload {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub is_demo: Option<bool>,
    pub group_ids: Option<Vec<i64>>,
    pub subject_configs: Option<Vec<SubjectConfigInput>>,
    #[validate(nested)]
    pub settings: Option<SettingsInput>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionPayload {
    pub subject_id: i64,
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(length(equal = 4))]
    pub options: Vec<String>,
    #[validate(range(min = 0, max = 3))]
    pub correct_index: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionPayload {
    pub subject_id: Option<i64>,
    #[validate(length(min = 1))]
    pub text: Option<String>,
    #[validate(length(equal = 4))]
    pub options: Option<Vec<String>>,
    #[validate(range(min = 0, max = 3))]
    pub correct_index: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserPayload {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: Option<String>,
    #[validate(length(min = 1))]
    pub full_name: String,
    pub workplace: Option<String>,
    pub role: Option<Role>,
    pub group_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPayload {
    #[validate(length(min = 1, max = 150))]
    pub username: Option<String>,
    pub password: Option<String>,
    #[validate(length(min = 1))]
    pub full_name: Option<String>,
    pub workplace: Option<String>,
    pub role: Option<Role>,
    /// `null` clears the membership; a missing key leaves it alone.
    #[serde(default, deserialize_with = "explicit_null")]
    pub group_id: Option<Option<i64>>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn demo_flag_accepts_truthy_spellings() {
        let query = |raw: &str| CatalogQuery {
            is_demo: Some(raw.to_string()),
            subject_id: None,
        };
        assert_eq!(query("TRUE").demo_flag(), Some(true));
        assert_eq!(query("1").demo_flag(), Some(true));
        assert_eq!(query("no").demo_flag(), Some(false));
        assert_eq!(CatalogQuery::default().demo_flag(), None);
    }

    #[test]
    fn question_payload_requires_four_options() {
        let payload: CreateQuestionPayload = serde_json::from_value(json!({
            "subjectId": 1,
            "text": "?",
            "options": ["a", "b", "c"],
            "correctIndex": 0
        }))
        .unwrap();
        assert!(payload.validate().is_err());
    }

    #[test]
    fn update_user_separates_null_from_missing_group() {
        let cleared: UpdateUserPayload = serde_json::from_value(json!({ "groupId": null })).unwrap();
        assert_eq!(cleared.group_id, Some(None));
        let untouched: UpdateUserPayload = serde_json::from_value(json!({})).unwrap();
        assert_eq!(untouched.group_id, None);
    }
}
