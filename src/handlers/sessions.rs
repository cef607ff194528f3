// src/handlers/sessions.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    engine::{
        access_code::{generate_access_codes, normalize_access_code},
        draw::{AssemblyOptions, assemble_instance},
        lifecycle::redemption_closed,
        report::{participant_review, session_report},
    },
    error::AppError,
    handlers::{pools::load_bank, templates::load_pools, templates::load_template},
    models::{
        participant::{ParticipantInstance, ParticipantStatus},
        pool::Pool,
        question::Question,
        session::{LaunchSessionRequest, Session, SessionResponse, SessionStatus},
        template::Template,
    },
    store::DynStore,
    utils::jwt::Claims,
};

/// Attempts at finding a batch of codes that collides with no stored code.
const LAUNCH_ATTEMPTS: usize = 3;

pub(crate) async fn load_session(
    store: &DynStore,
    id: Uuid,
    owner_id: Uuid,
) -> Result<Session, AppError> {
    store
        .get_session(id)
        .await?
        .filter(|s| s.owner_id == owner_id)
        .ok_or(AppError::NotFound("Session not found".to_string()))
}

/// Re-derives the session status from its participants.
///
/// The store derives and writes it atomically, so concurrent redemptions and
/// submissions never persist a status computed from a stale read.
pub(crate) async fn refresh_session_status(
    store: &DynStore,
    mut session: Session,
) -> Result<Session, AppError> {
    let derived = store
        .sync_session_status(session.id)
        .await?
        .ok_or(AppError::NotFound("Session not found".to_string()))?;

    if derived != session.status {
        tracing::info!(session_id = %session.id, from = %session.status, to = %derived, "Session status changed");
        session.status = derived;
    }

    Ok(session)
}

/// Expires unredeemed codes once the redemption window has closed, then refreshes the status.
pub(crate) async fn sync_session(store: &DynStore, session: Session) -> Result<Session, AppError> {
    if session.status.is_open() && redemption_closed(session.available_until, Utc::now()) {
        for participant in store.list_participants(session.id).await? {
            if participant.status == ParticipantStatus::NotStarted {
                store.expire_participant(&participant.access_code).await?;
            }
        }
    }
    refresh_session_status(store, session).await
}

/// Who the codes are for: named participants or an anonymous count.
fn participant_slots(payload: &LaunchSessionRequest) -> Result<Vec<Option<String>>, AppError> {
    match (&payload.participants, payload.participant_count) {
        (Some(_), Some(_)) => Err(AppError::BadRequest(
            "Give either participants or participant_count, not both".to_string(),
        )),
        (None, None) => Err(AppError::BadRequest(
            "Either participants or participant_count is required".to_string(),
        )),
        (None, Some(count)) => Ok(vec![None; count as usize]),
        (Some(identifiers), None) => identifiers
            .iter()
            .map(|id| {
                let id = id.trim();
                if id.is_empty() || id.len() > 200 {
                    Err(AppError::BadRequest(
                        "Participant identifiers must be between 1 and 200 chars".to_string(),
                    ))
                } else {
                    Ok(Some(id.to_string()))
                }
            })
            .collect(),
    }
}

/// Draws an independent instance per slot and assigns fresh access codes.
///
/// Kept synchronous so the thread-local RNG never lives across an await.
fn materialize(
    session_id: Uuid,
    template: &Template,
    pools: &HashMap<Uuid, Pool>,
    bank: &HashMap<Uuid, Question>,
    slots: &[Option<String>],
    config: &Config,
) -> Result<Vec<ParticipantInstance>, AppError> {
    let mut rng = rand::rng();
    let options = AssemblyOptions {
        shuffle_answers: config.shuffle_answers,
    };

    let codes = generate_access_codes(slots.len(), config.access_code_length, &mut rng);

    slots
        .iter()
        .zip(codes)
        .map(|(identifier, access_code)| {
            Ok(ParticipantInstance {
                session_id,
                access_code,
                identifier: identifier.clone(),
                sections: assemble_instance(template, pools, bank, options, &mut rng)?,
                answers: Vec::new(),
                status: ParticipantStatus::NotStarted,
                total_score: None,
                max_score: None,
                started_at: None,
                completed_at: None,
            })
        })
        .collect()
}

/// Launches a session from a template.
///
/// Each participant gets an independent draw; everything is stored at once or not at all.
pub async fn launch_session(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<LaunchSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let owner_id = claims.examiner_id()?;
    let slots = participant_slots(&payload)?;

    let now = Utc::now();
    if payload.available_until.is_some_and(|until| until <= now) {
        return Err(AppError::BadRequest(
            "available_until must be in the future".to_string(),
        ));
    }

    let template = load_template(&store, payload.template_id, owner_id).await?;
    let pools = load_pools(&store, owner_id).await?;
    let bank = load_bank(&store, owner_id).await?;

    let name = payload
        .name
        .map(|n| n.trim().to_string())
        .unwrap_or_else(|| format!("{} ({})", template.name, now.format("%Y-%m-%d %H:%M")));

    let session_id = Uuid::new_v4();
    let mut attempt = 0;
    let session = loop {
        attempt += 1;
        let participants = materialize(session_id, &template, &pools, &bank, &slots, &config)?;

        let session = Session {
            id: session_id,
            owner_id,
            template_id: template.id,
            name: name.clone(),
            access_codes: participants.iter().map(|p| p.access_code.clone()).collect(),
            time_limit_minutes: payload.time_limit_minutes,
            available_until: payload.available_until,
            status: SessionStatus::Active,
            created_at: now,
        };

        match store.create_session(session, participants).await {
            Ok(session) => break session,
            Err(AppError::Conflict(msg)) if attempt < LAUNCH_ATTEMPTS => {
                tracing::warn!("Access code collision on launch, retrying: {}", msg);
            }
            Err(e) => return Err(e),
        }
    };

    tracing::info!(
        session_id = %session.id,
        template_id = %template.id,
        participants = session.access_codes.len(),
        "Session launched"
    );

    let participant_count = session.access_codes.len();
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session,
            participant_count,
        }),
    ))
}

pub async fn list_sessions(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let sessions: Vec<SessionResponse> = store
        .list_sessions(claims.examiner_id()?)
        .await?
        .into_iter()
        .map(|session| SessionResponse {
            participant_count: session.access_codes.len(),
            session,
        })
        .collect();

    Ok(Json(sessions))
}

pub async fn get_session(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = load_session(&store, id, claims.examiner_id()?).await?;
    let session = sync_session(&store, session).await?;

    Ok(Json(SessionResponse {
        participant_count: session.access_codes.len(),
        session,
    }))
}

/// Cancels an open session. Unredeemed codes can no longer be used.
pub async fn cancel_session(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut session = load_session(&store, id, claims.examiner_id()?).await?;

    if !session.status.is_open() {
        return Err(AppError::Conflict(format!(
            "Session is already {}",
            session.status
        )));
    }

    store
        .set_session_status(session.id, SessionStatus::Cancelled)
        .await?;
    session.status = SessionStatus::Cancelled;
    tracing::info!(session_id = %session.id, "Session cancelled");

    Ok(Json(SessionResponse {
        participant_count: session.access_codes.len(),
        session,
    }))
}

/// Per-participant results of a session.
pub async fn session_results(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = load_session(&store, id, claims.examiner_id()?).await?;
    let session = sync_session(&store, session).await?;
    let participants = store.list_participants(session.id).await?;

    Ok(Json(session_report(&session, &participants)))
}

/// Question-by-question review of one participant.
pub async fn participant_detail(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path((id, code)): Path<(Uuid, String)>,
) -> Result<impl IntoResponse, AppError> {
    let session = load_session(&store, id, claims.examiner_id()?).await?;
    let code = normalize_access_code(&code)?;

    let participant = store
        .get_participant(&code)
        .await?
        .filter(|p| p.session_id == session.id)
        .ok_or(AppError::NotFound("Participant not found".to_string()))?;

    Ok(Json(participant_review(&participant)))
}
