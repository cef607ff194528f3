// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::examiner::{Examiner, LoginRequest, MeResponse, RegisterRequest},
    store::DynStore,
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

/// Registers a new examiner.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the examiner (without the hash).
pub async fn register(
    State(store): State<DynStore>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let examiner = Examiner {
        id: Uuid::new_v4(),
        username: payload.username.trim().to_string(),
        password: hash_password(&payload.password)?,
        created_at: Utc::now(),
    };

    let examiner = store.create_examiner(examiner).await?;
    tracing::info!(examiner_id = %examiner.id, "Examiner registered");

    Ok((StatusCode::CREATED, Json(examiner)))
}

/// Authenticates an examiner and returns a bearer token.
pub async fn login(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let examiner = store
        .get_examiner_by_username(payload.username.trim())
        .await?
        .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    verify_password(&payload.password, &examiner.password)?;

    let token = sign_jwt(
        examiner.id,
        &examiner.username,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "expires_in": config.jwt_expiration
    })))
}

/// Current examiner's profile with counts of what they own.
pub async fn me(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let examiner_id = claims.examiner_id()?;

    let examiner = store
        .get_examiner(examiner_id)
        .await?
        .ok_or(AppError::AuthError("Examiner no longer exists".to_string()))?;

    Ok(Json(MeResponse {
        id: examiner.id,
        username: examiner.username,
        created_at: examiner.created_at,
        question_count: store.list_questions(examiner_id).await?.len(),
        pool_count: store.list_pools(examiner_id).await?.len(),
        template_count: store.list_templates(examiner_id).await?.len(),
        session_count: store.list_sessions(examiner_id).await?.len(),
    }))
}
