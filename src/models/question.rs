use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Question {
    pub id: i64,
    pub subject_id: i64,
    pub text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    /// Zero-based index into the four options.
    pub correct_index: i32,
}

impl Question {
    pub fn options(&self) -> Vec<String> {
        vec![
            self.option_a.clone(),
            self.option_b.clone(),
            self.option_c.clone(),
            self.option_d.clone(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct QuestionDraft {
    pub subject_id: i64,
    pub text: String,
    pub options: [String; OPTION_COUNT],
    pub correct_index: i32,
}

impl QuestionDraft {
    /// Builds a draft when exactly four options are given and the index points at one.
    pub fn new(subject_id: i64, text: String, options: Vec<String>, correct_index: i64) -> Option<Self> {
        let options: [String; OPTION_COUNT] = options.try_into().ok()?;
        if !(0..OPTION_COUNT as i64).contains(&correct_index) {
            return None;
        }
        Some(Self {
            subject_id,
            text,
            options,
            correct_index: correct_index as i32,
        })
    }
}
