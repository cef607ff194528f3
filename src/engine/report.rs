// src/engine/report.rs

use crate::{
    engine::scoring::{percentage, score_instance},
    models::{
        participant::{
            ParticipantInstance, ParticipantResult, ParticipantReview, ParticipantStatus,
            ReviewItem, SessionReport,
        },
        session::Session,
    },
};

/// Builds the examiner's per-participant table for a session.
pub fn session_report(session: &Session, participants: &[ParticipantInstance]) -> SessionReport {
    let rows: Vec<ParticipantResult> = participants
        .iter()
        .map(|p| ParticipantResult {
            access_code: p.access_code.clone(),
            identifier: p.identifier.clone(),
            status: p.status,
            started_at: p.started_at,
            completed_at: p.completed_at,
            total_score: p.total_score,
            max_score: p.max_score,
            percentage: match (p.total_score, p.max_score) {
                (Some(total), Some(max)) => percentage(total, max),
                _ => None,
            },
        })
        .collect();

    let completed: Vec<f64> = rows
        .iter()
        .filter(|r| r.status == ParticipantStatus::Completed)
        .filter_map(|r| r.percentage)
        .collect();

    let average_percentage = if completed.is_empty() {
        None
    } else {
        let avg = completed.iter().sum::<f64>() / completed.len() as f64;
        Some((avg * 100.0).round() / 100.0)
    };

    SessionReport {
        session_id: session.id,
        session_name: session.name.clone(),
        status: session.status,
        participant_count: rows.len(),
        completed_count: rows
            .iter()
            .filter(|r| r.status == ParticipantStatus::Completed)
            .count(),
        average_percentage,
        participants: rows,
    }
}

/// Question-by-question review of one participant, flagging unanswered questions.
pub fn participant_review(instance: &ParticipantInstance) -> ParticipantReview {
    let card = score_instance(&instance.sections, &instance.answers);

    let questions = instance
        .sections
        .iter()
        .flat_map(|s| s.questions.iter().map(move |q| (s, q)));

    let items: Vec<ReviewItem> = questions
        .zip(card.items.iter())
        .map(|((section, question), score)| ReviewItem {
            section: section.pool_name.clone(),
            question_id: question.id,
            text: question.text.clone(),
            answers: question.answers.clone(),
            selected_answer_id: score.selected_answer_id,
            correct_answer_id: score.correct_answer_id,
            answered: score.answered(),
            is_correct: score.is_correct(),
            points_possible: score.points_possible,
            points_awarded: score.points_awarded,
        })
        .collect();

    ParticipantReview {
        access_code: instance.access_code.clone(),
        identifier: instance.identifier.clone(),
        status: instance.status,
        total_score: instance.total_score,
        max_score: instance.max_score,
        unanswered_count: items.iter().filter(|i| !i.answered).count(),
        items,
    }
}
