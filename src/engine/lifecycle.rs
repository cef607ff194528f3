// src/engine/lifecycle.rs

use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{participant::ParticipantStatus, session::SessionStatus},
};

/// Allowed access-code transitions. There is no way back to `not_started`.
pub fn can_transition(from: ParticipantStatus, to: ParticipantStatus) -> bool {
    use ParticipantStatus::*;

    matches!(
        (from, to),
        (NotStarted, InProgress) | (InProgress, Completed) | (NotStarted, Expired)
    )
}

/// Checks that a code may be redeemed in a session with `session_status`.
pub fn ensure_can_start(
    status: ParticipantStatus,
    session_status: SessionStatus,
) -> Result<(), AppError> {
    if !session_status.is_open() {
        return Err(AppError::Conflict(format!(
            "This test session is {}",
            session_status
        )));
    }

    match status {
        ParticipantStatus::NotStarted => Ok(()),
        ParticipantStatus::InProgress => Err(AppError::Conflict(
            "Access code has already been used".to_string(),
        )),
        ParticipantStatus::Completed => Err(AppError::Conflict(
            "This test has already been submitted".to_string(),
        )),
        ParticipantStatus::Expired => Err(AppError::Conflict("Access code has expired".to_string())),
    }
}

/// Checks that answers may be submitted for a code.
pub fn ensure_can_submit(
    status: ParticipantStatus,
    session_status: SessionStatus,
) -> Result<(), AppError> {
    if session_status == SessionStatus::Cancelled {
        return Err(AppError::Conflict("This test session was cancelled".to_string()));
    }

    match status {
        ParticipantStatus::InProgress => Ok(()),
        ParticipantStatus::NotStarted => Err(AppError::Conflict(
            "This test has not been started".to_string(),
        )),
        ParticipantStatus::Completed => Err(AppError::Conflict(
            "This test has already been submitted".to_string(),
        )),
        ParticipantStatus::Expired => Err(AppError::Conflict("Access code has expired".to_string())),
    }
}

/// Whether the redemption window of a session has closed at `now`.
pub fn redemption_closed(available_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    available_until.is_some_and(|deadline| now > deadline)
}

/// Session status implied by its participants.
///
/// Cancelled sessions stay cancelled. A session with no started participant
/// whose codes all expired is expired; once every code is terminal it is
/// completed; any started participant makes it in progress.
pub fn derive_session_status(
    current: SessionStatus,
    participants: &[ParticipantStatus],
) -> SessionStatus {
    if current == SessionStatus::Cancelled || participants.is_empty() {
        return current;
    }

    let all_expired = participants.iter().all(|s| *s == ParticipantStatus::Expired);
    let all_terminal = participants.iter().all(ParticipantStatus::is_terminal);
    let any_started = participants
        .iter()
        .any(|s| matches!(s, ParticipantStatus::InProgress | ParticipantStatus::Completed));

    if all_expired {
        SessionStatus::Expired
    } else if all_terminal {
        SessionStatus::Completed
    } else if any_started {
        SessionStatus::InProgress
    } else {
        current
    }
}
