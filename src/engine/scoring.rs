// src/engine/scoring.rs

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::{
    error::AppError,
    models::participant::{DrawnSection, SubmittedAnswer},
};

/// Score of a single drawn question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionScore {
    pub question_id: Uuid,
    pub selected_answer_id: Option<Uuid>,
    pub correct_answer_id: Option<Uuid>,
    pub points_possible: u32,
    pub points_awarded: u32,
}

impl QuestionScore {
    pub fn answered(&self) -> bool {
        self.selected_answer_id.is_some()
    }

    pub fn is_correct(&self) -> bool {
        self.selected_answer_id.is_some() && self.selected_answer_id == self.correct_answer_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreCard {
    pub total_score: u32,
    pub max_score: u32,
    pub correct_count: usize,
    pub answered_count: usize,
    /// One entry per drawn question, in presentation order.
    pub items: Vec<QuestionScore>,
}

/// Rejects submissions that reference questions or answers outside the instance,
/// or answer the same question twice.
pub fn validate_submission(
    sections: &[DrawnSection],
    answers: &[SubmittedAnswer],
) -> Result<(), AppError> {
    let drawn: HashMap<Uuid, _> = sections
        .iter()
        .flat_map(|s| s.questions.iter().map(|q| (q.id, q)))
        .collect();

    let mut seen = HashSet::with_capacity(answers.len());
    for answer in answers {
        let question = drawn.get(&answer.question_id).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Question {} is not part of this test",
                answer.question_id
            ))
        })?;

        if !seen.insert(answer.question_id) {
            return Err(AppError::BadRequest(format!(
                "Question {} is answered more than once",
                answer.question_id
            )));
        }

        if !question.has_answer(answer.selected_answer_id) {
            return Err(AppError::BadRequest(format!(
                "Answer {} does not belong to question {}",
                answer.selected_answer_id, answer.question_id
            )));
        }
    }

    Ok(())
}

/// Scores a submission against the drawn sections.
///
/// Unanswered questions score zero. Answers for unknown questions are ignored;
/// call [`validate_submission`] first to reject them.
pub fn score_instance(sections: &[DrawnSection], answers: &[SubmittedAnswer]) -> ScoreCard {
    let selected: HashMap<Uuid, Uuid> = answers
        .iter()
        .map(|a| (a.question_id, a.selected_answer_id))
        .collect();

    let mut card = ScoreCard {
        total_score: 0,
        max_score: 0,
        correct_count: 0,
        answered_count: 0,
        items: Vec::new(),
    };

    for section in sections {
        for question in &section.questions {
            let selected_answer_id = selected.get(&question.id).copied();
            let correct_answer_id = question.correct_answer_id();
            let correct = selected_answer_id.is_some() && selected_answer_id == correct_answer_id;
            let points_awarded = if correct { section.points } else { 0 };

            card.max_score += section.points;
            card.total_score += points_awarded;
            if correct {
                card.correct_count += 1;
            }
            if selected_answer_id.is_some() {
                card.answered_count += 1;
            }

            card.items.push(QuestionScore {
                question_id: question.id,
                selected_answer_id,
                correct_answer_id,
                points_possible: section.points,
                points_awarded,
            });
        }
    }

    card
}

/// Percentage of `total` over `max`, rounded to two decimals.
pub fn percentage(total: u32, max: u32) -> Option<f64> {
    if max == 0 {
        return None;
    }
    let raw = f64::from(total) / f64::from(max) * 100.0;
    Some((raw * 100.0).round() / 100.0)
}
