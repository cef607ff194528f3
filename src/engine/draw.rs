// src/engine/draw.rs

use std::collections::{HashMap, HashSet};

use rand::{Rng, seq::SliceRandom};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        participant::{DrawnQuestion, DrawnSection},
        pool::Pool,
        question::Question,
        template::{PoolSelection, Template},
    },
};

/// Knobs for turning a template into one participant's questions.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyOptions {
    pub shuffle_answers: bool,
}

/// Uniform sample of `count` ids without replacement.
///
/// The result is in draw order, so it doubles as the presentation order.
pub fn draw_ids<R: Rng + ?Sized>(
    candidates: &[Uuid],
    count: usize,
    rng: &mut R,
) -> Result<Vec<Uuid>, AppError> {
    let mut distinct: Vec<Uuid> = Vec::with_capacity(candidates.len());
    let mut seen = HashSet::with_capacity(candidates.len());
    for id in candidates {
        if seen.insert(*id) {
            distinct.push(*id);
        }
    }

    if count > distinct.len() {
        return Err(AppError::BadRequest(format!(
            "Cannot draw {} questions from a pool of {}",
            count,
            distinct.len()
        )));
    }

    distinct.shuffle(rng);
    distinct.truncate(count);
    Ok(distinct)
}

/// Question ids of `pool` that still resolve to a question in `bank`.
pub fn available_question_ids(pool: &Pool, bank: &HashMap<Uuid, Question>) -> Vec<Uuid> {
    pool.question_ids
        .iter()
        .filter(|id| bank.contains_key(id))
        .copied()
        .collect()
}

/// Checks a list of selections against the pools and bank they draw from.
///
/// Used when a template is saved and again when a session is launched.
pub fn validate_selections(
    selections: &[PoolSelection],
    pools: &HashMap<Uuid, Pool>,
    bank: &HashMap<Uuid, Question>,
) -> Result<(), AppError> {
    if selections.is_empty() {
        return Err(AppError::BadRequest(
            "A template needs at least one pool selection".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for selection in selections {
        if !seen.insert(selection.pool_id) {
            return Err(AppError::BadRequest(format!(
                "Pool {} is selected more than once",
                selection.pool_id
            )));
        }

        if selection.questions_to_draw == 0 {
            return Err(AppError::BadRequest(
                "questions_to_draw must be at least 1".to_string(),
            ));
        }

        let pool = pools
            .get(&selection.pool_id)
            .ok_or_else(|| AppError::NotFound(format!("Pool {} not found", selection.pool_id)))?;

        let available = available_question_ids(pool, bank).len();
        if selection.questions_to_draw as usize > available {
            return Err(AppError::BadRequest(format!(
                "Pool '{}' has {} questions, cannot draw {}",
                pool.name, available, selection.questions_to_draw
            )));
        }
    }

    Ok(())
}

/// Draws one participant's sections from `template`.
///
/// Sections follow the template's selection order. Each drawn question is a
/// snapshot of the bank entry, so later edits to the bank do not change it.
pub fn assemble_instance<R: Rng + ?Sized>(
    template: &Template,
    pools: &HashMap<Uuid, Pool>,
    bank: &HashMap<Uuid, Question>,
    options: AssemblyOptions,
    rng: &mut R,
) -> Result<Vec<DrawnSection>, AppError> {
    validate_selections(&template.pool_selections, pools, bank)?;

    let mut sections = Vec::with_capacity(template.pool_selections.len());
    for selection in &template.pool_selections {
        let pool = pools
            .get(&selection.pool_id)
            .ok_or_else(|| AppError::NotFound(format!("Pool {} not found", selection.pool_id)))?;

        let candidates = available_question_ids(pool, bank);
        let drawn = draw_ids(&candidates, selection.questions_to_draw as usize, rng)?;

        let mut questions = Vec::with_capacity(drawn.len());
        for id in drawn {
            let question = bank
                .get(&id)
                .ok_or_else(|| AppError::NotFound(format!("Question {} not found", id)))?;

            let mut answers = question.answers.clone();
            if options.shuffle_answers {
                answers.shuffle(rng);
            }

            questions.push(DrawnQuestion {
                id: question.id,
                text: question.text.clone(),
                answers,
            });
        }

        sections.push(DrawnSection {
            pool_id: pool.id,
            pool_name: pool.name.clone(),
            points: selection.points,
            questions,
        });
    }

    Ok(sections)
}
