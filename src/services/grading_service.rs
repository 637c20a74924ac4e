use serde_json::{Map, Value as JsonValue};

use crate::error::{Error, Result};
use crate::models::module::Module;
use crate::models::question::Question;
use crate::utils::coerce::{clamp_i32, loose_int};

/// Outcome of scoring one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub correct_answers: i32,
    pub total_questions: i32,
    pub score: i32,
    pub is_passed: bool,
}

/// One submitted answer, keyed by the parsed question id.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub choice: JsonValue,
}

pub struct GradingService;

impl GradingService {
    /// Parses the `answers` mapping of a submission. It must be a non-empty object whose
    /// keys are all integers.
    pub fn parse_answers(answers: &JsonValue) -> Result<Vec<SubmittedAnswer>> {
        let map: &Map<String, JsonValue> = match answers {
            JsonValue::Object(map) if !map.is_empty() => map,
            _ => return Err(Error::BadRequest("moduleId va answers kerak".to_string())),
        };

        map.iter()
            .map(|(key, choice)| {
                let question_id = key.trim().parse::<i64>().map_err(|_| {
                    Error::BadRequest("answers keylari savol ID bo'lishi kerak".to_string())
                })?;
                Ok(SubmittedAnswer {
                    question_id,
                    choice: choice.clone(),
                })
            })
            .collect()
    }

    /// Scores `answers` against the resolved `questions`.
    ///
    /// The total is the number of submitted answers; a question counts as correct when its
    /// answer parses to its correct index.
    pub fn grade(module: &Module, questions: &[Question], answers: &[SubmittedAnswer]) -> Grade {
        let correct = questions
            .iter()
            .filter(|q| {
                answers
                    .iter()
                    .find(|a| a.question_id == q.id)
                    .and_then(|a| loose_int(&a.choice))
                    == Some(i64::from(q.correct_index))
            })
            .count() as i64;

        let score = clamp_i32(correct * i64::from(module.points_per_answer));
        Grade {
            correct_answers: clamp_i32(correct),
            total_questions: clamp_i32(answers.len() as i64),
            score,
            is_passed: score >= module.passing_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn module(points_per_answer: i32, passing_score: i32) -> Module {
        Module {
            id: 1,
            name: "Kompozitsiya".into(),
            is_demo: false,
            points_per_answer,
            duration_minutes: 30,
            passing_score,
            randomize: false,
            is_active: true,
        }
    }

    fn question(id: i64, correct_index: i32) -> Question {
        Question {
            id,
            subject_id: 1,
            text: format!("Savol {}", id),
            option_a: "A".into(),
            option_b: "B".into(),
            option_c: "C".into(),
            option_d: "D".into(),
            correct_index,
        }
    }

    fn five_questions_three_right() -> (Vec<Question>, Vec<SubmittedAnswer>) {
        let questions: Vec<Question> = (1..=5).map(|id| question(id, 0)).collect();
        let answers = GradingService::parse_answers(&json!({
            "1": 0, "2": "0", "3": 0, "4": 2, "5": null
        }))
        .unwrap();
        (questions, answers)
    }

    #[test]
    fn score_is_points_times_correct() {
        let (questions, answers) = five_questions_three_right();

        let grade = GradingService::grade(&module(5, 15), &questions, &answers);
        assert_eq!(grade.correct_answers, 3);
        assert_eq!(grade.total_questions, 5);
        assert_eq!(grade.score, 15);
        assert!(grade.is_passed);

        let grade = GradingService::grade(&module(5, 16), &questions, &answers);
        assert!(!grade.is_passed);
    }

    #[test]
    fn answers_must_be_a_non_empty_object_with_integer_keys() {
        assert!(matches!(
            GradingService::parse_answers(&json!({})),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            GradingService::parse_answers(&json!([1, 2])),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            GradingService::parse_answers(&json!({ "q1": 0 })),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn unparseable_choices_count_as_wrong() {
        let questions = vec![question(7, 1)];
        let answers = GradingService::parse_answers(&json!({ "7": "b" })).unwrap();
        let grade = GradingService::grade(&module(5, 0), &questions, &answers);
        assert_eq!(grade.correct_answers, 0);
        assert!(grade.is_passed);
    }
}
