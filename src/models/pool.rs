// src/models/pool.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'pools' table in the database.
/// A named grouping of the owner's bank questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub question_ids: Vec<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new pool.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePoolRequest {
    #[validate(length(min = 1, max = 100, message = "Pool name must be between 1 and 100 chars"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[serde(default)]
    pub question_ids: Vec<Uuid>,
}

/// DTO for updating a pool. Fields are optional; `question_ids` replaces the whole list.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePoolRequest {
    #[validate(length(min = 1, max = 100, message = "Pool name must be between 1 and 100 chars"))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub question_ids: Option<Vec<Uuid>>,
}

/// Pool as returned by the API, with the number of questions a template may draw from it.
#[derive(Debug, Serialize)]
pub struct PoolResponse {
    #[serde(flatten)]
    pub pool: Pool,
    pub question_count: usize,
}
