// src/handlers/templates.rs

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
    engine::draw::validate_selections,
    error::AppError,
    handlers::pools::load_bank,
    models::{
        pool::Pool,
        template::{
            CreateTemplateRequest, PoolSelection, Template, TemplateResponse,
            UpdateTemplateRequest,
        },
    },
    store::DynStore,
    utils::jwt::Claims,
};

pub(crate) async fn load_template(
    store: &DynStore,
    id: Uuid,
    owner_id: Uuid,
) -> Result<Template, AppError> {
    store
        .get_template(id)
        .await?
        .filter(|t| t.owner_id == owner_id)
        .ok_or(AppError::NotFound("Template not found".to_string()))
}

/// The examiner's pools keyed by id.
pub(crate) async fn load_pools(
    store: &DynStore,
    owner_id: Uuid,
) -> Result<HashMap<Uuid, Pool>, AppError> {
    Ok(store
        .list_pools(owner_id)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect())
}

/// Validates selections against the examiner's current pools at save time.
async fn check_selections(
    store: &DynStore,
    owner_id: Uuid,
    selections: &[PoolSelection],
) -> Result<(), AppError> {
    let pools = load_pools(store, owner_id).await?;
    let bank = load_bank(store, owner_id).await?;
    validate_selections(selections, &pools, &bank)
}

pub async fn list_templates(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let templates: Vec<TemplateResponse> = store
        .list_templates(claims.examiner_id()?)
        .await?
        .into_iter()
        .map(TemplateResponse::from)
        .collect();

    Ok(Json(templates))
}

/// Creates a template. Every selection must fit the pool it draws from.
pub async fn create_template(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let owner_id = claims.examiner_id()?;

    check_selections(&store, owner_id, &payload.pool_selections).await?;

    let now = Utc::now();
    let template = Template {
        id: Uuid::new_v4(),
        owner_id,
        name: payload.name.trim().to_string(),
        description: payload.description,
        pool_selections: payload.pool_selections,
        created_at: now,
        updated_at: now,
    };

    let template = store.insert_template(template).await?;
    tracing::debug!(template_id = %template.id, "Template created");

    Ok((StatusCode::CREATED, Json(TemplateResponse::from(template))))
}

pub async fn get_template(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let template = load_template(&store, id, claims.examiner_id()?).await?;
    Ok(Json(TemplateResponse::from(template)))
}

/// Updates a template; new selections are validated like on create.
pub async fn update_template(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTemplateRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let owner_id = claims.examiner_id()?;
    let mut template = load_template(&store, id, owner_id).await?;

    if let Some(selections) = payload.pool_selections {
        check_selections(&store, owner_id, &selections).await?;
        template.pool_selections = selections;
    }
    if let Some(name) = payload.name {
        template.name = name.trim().to_string();
    }
    if let Some(description) = payload.description {
        template.description = Some(description);
    }
    template.updated_at = Utc::now();

    if !store.update_template(template.clone()).await? {
        return Err(AppError::NotFound("Template not found".to_string()));
    }

    Ok(Json(TemplateResponse::from(template)))
}

/// Deletes a template. Sessions already launched from it are unaffected.
pub async fn delete_template(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_template(&store, id, claims.examiner_id()?).await?;

    if !store.delete_template(id).await? {
        return Err(AppError::NotFound("Template not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
