use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::module::{Module, ModuleSettings};
use crate::models::question::Question;
use crate::utils::coerce::LooseInt;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AvailableTests {
    pub main: Vec<AvailableTest>,
    pub demo: Vec<AvailableTest>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTest {
    pub id: i64,
    pub name: String,
    /// Only reported for live modules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_taken: Option<bool>,
    pub settings: ModuleSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartTestRequest {
    pub module_id: LooseInt,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitTestRequest {
    pub module_id: LooseInt,
    /// Question id -> selected option index. Kept raw so shape errors surface as 400s.
    pub answers: JsonValue,
    pub time_taken: LooseInt,
}

/// A question as handed to a participant: no answer key.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttemptQuestion {
    pub id: i64,
    pub subject_id: i64,
    pub text: String,
    pub options: Vec<String>,
}

impl From<&Question> for AttemptQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            subject_id: question.subject_id,
            text: question.text.clone(),
            options: question.options(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartedTest {
    pub module_id: i64,
    pub module_name: String,
    pub is_demo: bool,
    pub settings: ModuleSettings,
    pub questions: Vec<AttemptQuestion>,
}

impl StartedTest {
    pub fn new(module: &Module, questions: &[Question]) -> Self {
        Self {
            module_id: module.id,
            module_name: module.name.clone(),
            is_demo: module.is_demo,
            settings: module.settings(),
            questions: questions.iter().map(AttemptQuestion::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attempt_questions_never_carry_the_answer_key() {
        let question = Question {
            id: 4,
            subject_id: 2,
            text: "Rang nechta?".into(),
            option_a: "3".into(),
            option_b: "5".into(),
            option_c: "7".into(),
            option_d: "9".into(),
            correct_index: 2,
        };
        let value = serde_json::to_value(AttemptQuestion::from(&question)).unwrap();
        assert_eq!(
            value,
            json!({ "id": 4, "subjectId": 2, "text": "Rang nechta?", "options": ["3", "5", "7", "9"] })
        );
    }
}
