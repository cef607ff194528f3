// src/models/participant.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::{Answer, PublicAnswer, PublicQuestion};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    NotStarted,
    InProgress,
    Completed,
    Expired,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantStatus::NotStarted => "not_started",
            ParticipantStatus::InProgress => "in_progress",
            ParticipantStatus::Completed => "completed",
            ParticipantStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ParticipantStatus::Completed | ParticipantStatus::Expired)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParticipantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(ParticipantStatus::NotStarted),
            "in_progress" => Ok(ParticipantStatus::InProgress),
            "completed" => Ok(ParticipantStatus::Completed),
            "expired" => Ok(ParticipantStatus::Expired),
            other => Err(format!("unknown participant status '{}'", other)),
        }
    }
}

/// Snapshot of a question at launch time, answers in the order the participant sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnQuestion {
    pub id: Uuid,
    pub text: String,
    pub answers: Vec<Answer>,
}

impl DrawnQuestion {
    pub fn correct_answer_id(&self) -> Option<Uuid> {
        self.answers.iter().find(|a| a.is_correct).map(|a| a.id)
    }

    pub fn has_answer(&self, answer_id: Uuid) -> bool {
        self.answers.iter().any(|a| a.id == answer_id)
    }

    /// Strips correctness flags.
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            text: self.text.clone(),
            answers: self
                .answers
                .iter()
                .map(|a| PublicAnswer {
                    id: a.id,
                    text: a.text.clone(),
                })
                .collect(),
        }
    }
}

/// The questions drawn for one pool selection of the template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnSection {
    pub pool_id: Uuid,
    pub pool_name: String,
    pub points: u32,
    pub questions: Vec<DrawnQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: Uuid,
    pub selected_answer_id: Uuid,
}

/// Represents the 'participants' table in the database.
/// One row per access code, created at launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantInstance {
    pub session_id: Uuid,
    pub access_code: String,
    pub identifier: Option<String>,
    pub sections: Vec<DrawnSection>,
    pub answers: Vec<SubmittedAnswer>,
    pub status: ParticipantStatus,
    pub total_score: Option<u32>,
    pub max_score: Option<u32>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ParticipantInstance {
    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }
}

/// DTO for redeeming an access code.
#[derive(Debug, Deserialize, Validate)]
pub struct RedeemRequest {
    #[validate(length(min = 1, max = 32))]
    pub access_code: String,
    /// Name or e-mail entered by the participant. Required when the code
    /// was not launched with a pre-assigned identifier.
    #[validate(length(min = 1, max = 200, message = "Identifier must be between 1 and 200 chars"))]
    pub identifier: Option<String>,
}

/// DTO for submitting answers.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswersRequest {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

/// Section as shown to the participant.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicSection {
    pub pool_name: String,
    pub points: u32,
    pub questions: Vec<PublicQuestion>,
}

/// The participant-facing test instance.
#[derive(Debug, Serialize)]
pub struct InstanceView {
    pub access_code: String,
    pub session_name: String,
    pub identifier: Option<String>,
    pub status: ParticipantStatus,
    pub time_limit_minutes: u32,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub sections: Vec<PublicSection>,
}

impl InstanceView {
    pub fn new(instance: &ParticipantInstance, session_name: &str, time_limit_minutes: u32) -> Self {
        Self {
            access_code: instance.access_code.clone(),
            session_name: session_name.to_string(),
            identifier: instance.identifier.clone(),
            status: instance.status,
            time_limit_minutes,
            started_at: instance.started_at,
            sections: instance
                .sections
                .iter()
                .map(|s| PublicSection {
                    pool_name: s.pool_name.clone(),
                    points: s.points,
                    questions: s.questions.iter().map(DrawnQuestion::to_public).collect(),
                })
                .collect(),
        }
    }
}

/// Outcome of a completed (or otherwise closed) instance, returned to the participant.
#[derive(Debug, Serialize)]
pub struct SubmissionResult {
    pub access_code: String,
    pub status: ParticipantStatus,
    pub total_score: Option<u32>,
    pub max_score: Option<u32>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&ParticipantInstance> for SubmissionResult {
    fn from(instance: &ParticipantInstance) -> Self {
        Self {
            access_code: instance.access_code.clone(),
            status: instance.status,
            total_score: instance.total_score,
            max_score: instance.max_score,
            completed_at: instance.completed_at,
        }
    }
}

/// One row of the examiner's session report.
#[derive(Debug, Serialize)]
pub struct ParticipantResult {
    pub access_code: String,
    pub identifier: Option<String>,
    pub status: ParticipantStatus,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total_score: Option<u32>,
    pub max_score: Option<u32>,
    pub percentage: Option<f64>,
}

/// Examiner's report for one session.
#[derive(Debug, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub session_name: String,
    pub status: crate::models::session::SessionStatus,
    pub participant_count: usize,
    pub completed_count: usize,
    pub average_percentage: Option<f64>,
    pub participants: Vec<ParticipantResult>,
}

/// Per-question line of a participant review.
#[derive(Debug, Serialize)]
pub struct ReviewItem {
    pub section: String,
    pub question_id: Uuid,
    pub text: String,
    pub answers: Vec<Answer>,
    pub selected_answer_id: Option<Uuid>,
    pub correct_answer_id: Option<Uuid>,
    pub answered: bool,
    pub is_correct: bool,
    pub points_possible: u32,
    pub points_awarded: u32,
}

/// Examiner's detailed view of one participant.
#[derive(Debug, Serialize)]
pub struct ParticipantReview {
    pub access_code: String,
    pub identifier: Option<String>,
    pub status: ParticipantStatus,
    pub total_score: Option<u32>,
    pub max_score: Option<u32>,
    pub unanswered_count: usize,
    pub items: Vec<ReviewItem>,
}
