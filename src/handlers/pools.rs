// src/handlers/pools.rs

use std::collections::{HashMap, HashSet};

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
    config::{Config, PoolDeletePolicy},
    engine::draw::available_question_ids,
    error::AppError,
    models::{
        pool::{CreatePoolRequest, Pool, PoolResponse, UpdatePoolRequest},
        question::Question,
    },
    store::DynStore,
    utils::jwt::Claims,
};

pub(crate) async fn load_pool(store: &DynStore, id: Uuid, owner_id: Uuid) -> Result<Pool, AppError> {
    store
        .get_pool(id)
        .await?
        .filter(|p| p.owner_id == owner_id)
        .ok_or(AppError::NotFound("Pool not found".to_string()))
}

/// The examiner's bank keyed by id.
pub(crate) async fn load_bank(
    store: &DynStore,
    owner_id: Uuid,
) -> Result<HashMap<Uuid, Question>, AppError> {
    Ok(store
        .list_questions(owner_id)
        .await?
        .into_iter()
        .map(|q| (q.id, q))
        .collect())
}

/// Checks that the ids are distinct and all belong to the examiner's bank.
fn check_question_ids(ids: &[Uuid], bank: &HashMap<Uuid, Question>) -> Result<(), AppError> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id) {
            return Err(AppError::BadRequest(format!(
                "Question {} is listed more than once",
                id
            )));
        }
        if !bank.contains_key(id) {
            return Err(AppError::NotFound(format!("Question {} not found", id)));
        }
    }
    Ok(())
}

fn to_response(pool: Pool, bank: &HashMap<Uuid, Question>) -> PoolResponse {
    let question_count = available_question_ids(&pool, bank).len();
    PoolResponse {
        pool,
        question_count,
    }
}

pub async fn list_pools(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = claims.examiner_id()?;
    let bank = load_bank(&store, owner_id).await?;

    let pools: Vec<PoolResponse> = store
        .list_pools(owner_id)
        .await?
        .into_iter()
        .map(|p| to_response(p, &bank))
        .collect();

    Ok(Json(pools))
}

/// Creates a pool from questions of the examiner's bank.
pub async fn create_pool(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePoolRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let owner_id = claims.examiner_id()?;

    let bank = load_bank(&store, owner_id).await?;
    check_question_ids(&payload.question_ids, &bank)?;

    let now = Utc::now();
    let pool = Pool {
        id: Uuid::new_v4(),
        owner_id,
        name: payload.name.trim().to_string(),
        description: payload.description,
        question_ids: payload.question_ids,
        created_at: now,
        updated_at: now,
    };

    let pool = store.insert_pool(pool).await?;
    tracing::debug!(pool_id = %pool.id, "Pool created");

    Ok((StatusCode::CREATED, Json(to_response(pool, &bank))))
}

pub async fn get_pool(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = claims.examiner_id()?;
    let pool = load_pool(&store, id, owner_id).await?;
    let bank = load_bank(&store, owner_id).await?;

    Ok(Json(to_response(pool, &bank)))
}

/// Updates a pool. Shrinking a pool below what a template draws from it is
/// allowed here; the template is rejected at launch instead.
pub async fn update_pool(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePoolRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let owner_id = claims.examiner_id()?;
    let mut pool = load_pool(&store, id, owner_id).await?;
    let bank = load_bank(&store, owner_id).await?;

    if let Some(name) = payload.name {
        pool.name = name.trim().to_string();
    }
    if let Some(description) = payload.description {
        pool.description = Some(description);
    }
    if let Some(question_ids) = payload.question_ids {
        check_question_ids(&question_ids, &bank)?;
        pool.question_ids = question_ids;
    }
    pool.updated_at = Utc::now();

    if !store.update_pool(pool.clone()).await? {
        return Err(AppError::NotFound("Pool not found".to_string()));
    }

    Ok(Json(to_response(pool, &bank)))
}

/// Deletes a pool, honoring the configured policy for templates that use it.
pub async fn delete_pool(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let pool = load_pool(&store, id, claims.examiner_id()?).await?;

    let detach = match config.pool_delete_policy {
        PoolDeletePolicy::Block => {
            let referencing = store.templates_referencing_pool(id).await?;
            if !referencing.is_empty() {
                let names: Vec<&str> = referencing.iter().map(|t| t.name.as_str()).collect();
                return Err(AppError::Conflict(format!(
                    "Pool '{}' is used by templates: {}",
                    pool.name,
                    names.join(", ")
                )));
            }
            false
        }
        PoolDeletePolicy::Cascade => true,
    };

    if !store.delete_pool(id, detach).await? {
        return Err(AppError::NotFound("Pool not found".to_string()));
    }
    tracing::info!(pool_id = %id, detach, "Pool deleted");

    Ok(StatusCode::NO_CONTENT)
}
