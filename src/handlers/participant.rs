// src/handlers/participant.rs
//
// Unauthenticated endpoints used by participants holding an access code.

use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use validator::Validate;

use crate::{
    engine::{
        access_code::normalize_access_code,
        lifecycle::{ensure_can_start, ensure_can_submit, redemption_closed},
        scoring::{score_instance, validate_submission},
    },
    error::AppError,
    handlers::sessions::refresh_session_status,
    models::{
        participant::{
            InstanceView, ParticipantInstance, ParticipantStatus, RedeemRequest,
            SubmissionResult, SubmitAnswersRequest,
        },
        session::Session,
    },
    store::{Completion, DynStore},
};

/// Looks up a code and the session it belongs to.
async fn load_instance(
    store: &DynStore,
    raw_code: &str,
) -> Result<(ParticipantInstance, Session), AppError> {
    let code = normalize_access_code(raw_code)?;

    let instance = store
        .get_participant(&code)
        .await?
        .ok_or(AppError::NotFound("Access code not found".to_string()))?;

    let session = store
        .get_session(instance.session_id)
        .await?
        .ok_or(AppError::NotFound("Access code not found".to_string()))?;

    Ok((instance, session))
}

/// Re-reads a code after a transition.
async fn reload(store: &DynStore, code: &str) -> Result<ParticipantInstance, AppError> {
    store
        .get_participant(code)
        .await?
        .ok_or(AppError::NotFound("Access code not found".to_string()))
}

/// Redeems an access code and returns the participant's test instance.
///
/// The code moves to `in_progress`; redeeming it again is a conflict.
/// Use `GET /api/take/{code}` to resume.
pub async fn redeem(
    State(store): State<DynStore>,
    Json(payload): Json<RedeemRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let (instance, session) = load_instance(&store, &payload.access_code).await?;

    if instance.status == ParticipantStatus::NotStarted
        && session.status.is_open()
        && redemption_closed(session.available_until, Utc::now())
    {
        store.expire_participant(&instance.access_code).await?;
        refresh_session_status(&store, session).await?;
        return Err(AppError::Conflict(
            "This test session is no longer available".to_string(),
        ));
    }

    ensure_can_start(instance.status, session.status)?;

    // A pre-assigned identifier wins over what the participant types in.
    let identifier = match (&instance.identifier, payload.identifier) {
        (Some(_), _) => None,
        (None, Some(entered)) if !entered.trim().is_empty() => Some(entered.trim().to_string()),
        (None, _) => {
            return Err(AppError::BadRequest(
                "An identifier is required to start this test".to_string(),
            ));
        }
    };

    if !store
        .start_participant(&instance.access_code, identifier, Utc::now())
        .await?
    {
        return Err(AppError::Conflict(
            "Access code has already been used".to_string(),
        ));
    }

    let instance = reload(&store, &instance.access_code).await?;
    let session = refresh_session_status(&store, session).await?;
    tracing::info!(
        session_id = %session.id,
        access_code = %instance.access_code,
        "Access code redeemed"
    );

    Ok(Json(InstanceView::new(
        &instance,
        &session.name,
        session.time_limit_minutes,
    )))
}

/// Resumes a started test, or shows the outcome of a finished one.
pub async fn resume(
    State(store): State<DynStore>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let (instance, session) = load_instance(&store, &code).await?;

    match instance.status {
        ParticipantStatus::InProgress => Ok(Json(InstanceView::new(
            &instance,
            &session.name,
            session.time_limit_minutes,
        ))
        .into_response()),
        ParticipantStatus::Completed | ParticipantStatus::Expired => {
            Ok(Json(SubmissionResult::from(&instance)).into_response())
        }
        ParticipantStatus::NotStarted => Err(AppError::Conflict(
            "This test has not been started".to_string(),
        )),
    }
}

/// Scores and stores the participant's answers. Missing answers score zero.
pub async fn submit(
    State(store): State<DynStore>,
    Path(code): Path<String>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (instance, session) = load_instance(&store, &code).await?;

    ensure_can_submit(instance.status, session.status)?;
    validate_submission(&instance.sections, &payload.answers)?;

    let card = score_instance(&instance.sections, &payload.answers);
    let completion = Completion {
        answers: payload.answers,
        total_score: card.total_score,
        max_score: card.max_score,
        completed_at: Utc::now(),
    };

    if !store
        .complete_participant(&instance.access_code, completion)
        .await?
    {
        return Err(AppError::Conflict(
            "This test has already been submitted".to_string(),
        ));
    }

    let instance = reload(&store, &instance.access_code).await?;
    let session = refresh_session_status(&store, session).await?;
    tracing::info!(
        session_id = %session.id,
        access_code = %instance.access_code,
        score = card.total_score,
        max = card.max_score,
        "Test submitted"
    );

    Ok(Json(SubmissionResult::from(&instance)))
}
