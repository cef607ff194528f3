// src/models/examiner.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'examiners' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Examiner {
    pub id: Uuid,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for registering a new examiner.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 8,
        max = 128,
        message = "Password length must be between 8 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for examiner login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Profile of the current examiner with bank statistics.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub question_count: usize,
    pub pool_count: usize,
    pub template_count: usize,
    pub session_count: usize,
}
