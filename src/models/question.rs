// src/models/question.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

pub const MIN_ANSWERS: usize = 2;
pub const MAX_ANSWERS: usize = 6;

/// One answer option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: Uuid,
    pub text: String,
    pub is_correct: bool,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub owner_id: Uuid,

    /// The text content of the question.
    pub text: String,

    /// Free-form labels used for filtering the bank.
    pub tags: Vec<String>,

    /// Between 2 and 6 answers, exactly one of them correct.
    pub answers: Vec<Answer>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Question {
    pub fn correct_answer_id(&self) -> Option<Uuid> {
        self.answers.iter().find(|a| a.is_correct).map(|a| a.id)
    }
}

/// DTO for an answer in a create/update request. Ids are assigned by the server.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerInput {
    #[validate(length(min = 1, max = 500, message = "Answer text must be between 1 and 500 chars"))]
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000, message = "Question text must be between 1 and 2000 chars"))]
    pub text: String,
    #[serde(default)]
    #[validate(custom(function = validate_tags))]
    pub tags: Vec<String>,
    #[validate(nested)]
    pub answers: Vec<AnswerInput>,
}

/// DTO for updating a question. Fields are optional; `answers` replaces the whole set.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 2000, message = "Question text must be between 1 and 2000 chars"))]
    pub text: Option<String>,
    #[validate(custom(function = validate_tags))]
    pub tags: Option<Vec<String>>,
    #[validate(nested)]
    pub answers: Option<Vec<AnswerInput>>,
}

/// Query parameters for listing the question bank.
#[derive(Debug, Default, Deserialize)]
pub struct QuestionListParams {
    /// Exact tag match, case-insensitive.
    pub tag: Option<String>,
    /// Substring of the question text, case-insensitive.
    pub q: Option<String>,
    /// Only questions without any tag.
    #[serde(default)]
    pub untagged: bool,
}

/// Answer as shown to a participant: no correctness flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAnswer {
    pub id: Uuid,
    pub text: String,
}

/// Question as shown to a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub text: String,
    pub answers: Vec<PublicAnswer>,
}

fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.len() > 20 {
        return Err(validator::ValidationError::new("too_many_tags"));
    }
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || tag.len() > 50 {
            return Err(validator::ValidationError::new("invalid_tag"));
        }
    }
    Ok(())
}

/// Checks the answer-set rules: 2 to 6 answers, exactly one correct.
pub fn validate_answer_set(answers: &[AnswerInput]) -> Result<(), AppError> {
    if answers.len() < MIN_ANSWERS || answers.len() > MAX_ANSWERS {
        return Err(AppError::BadRequest(format!(
            "A question needs between {} and {} answers, got {}",
            MIN_ANSWERS,
            MAX_ANSWERS,
            answers.len()
        )));
    }

    let correct = answers.iter().filter(|a| a.is_correct).count();
    if correct != 1 {
        return Err(AppError::BadRequest(format!(
            "A question needs exactly one correct answer, got {}",
            correct
        )));
    }

    Ok(())
}

/// Normalizes tags: trimmed, lowercased, deduplicated, original order kept.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
