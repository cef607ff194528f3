// src/models/session.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    InProgress,
    Completed,
    Cancelled,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Expired => "expired",
        }
    }

    /// Whether participants may still redeem codes or submit.
    pub fn is_open(&self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            "expired" => Ok(SessionStatus::Expired),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

/// Represents the 'sessions' table in the database.
/// Structurally immutable once launched; only `status` changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub access_codes: Vec<String>,
    pub time_limit_minutes: u32,
    /// Codes not redeemed by this instant expire.
    pub available_until: Option<chrono::DateTime<chrono::Utc>>,
    pub status: SessionStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for launching a session from a template.
///
/// Either `participants` (one code per identifier) or `participant_count`
/// (anonymous codes) must be given.
#[derive(Debug, Deserialize, Validate)]
pub struct LaunchSessionRequest {
    pub template_id: Uuid,
    #[validate(length(min = 1, max = 100, message = "Session name must be between 1 and 100 chars"))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 1440, message = "time_limit_minutes must be between 1 and 1440"))]
    pub time_limit_minutes: u32,
    pub available_until: Option<chrono::DateTime<chrono::Utc>>,
    #[validate(range(min = 1, max = 500, message = "participant_count must be between 1 and 500"))]
    pub participant_count: Option<u32>,
    #[validate(length(min = 1, max = 500, message = "participants must list between 1 and 500 identifiers"))]
    pub participants: Option<Vec<String>>,
}

/// Session as returned by the API.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub participant_count: usize,
}
