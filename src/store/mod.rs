// src/store/mod.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::{Config, StoreBackend},
    error::AppError,
    models::{
        examiner::Examiner,
        participant::{ParticipantInstance, SubmittedAnswer},
        pool::Pool,
        question::Question,
        session::{Session, SessionStatus},
        template::Template,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared handle to the configured store.
pub type DynStore = Arc<dyn Store>;

/// Values stamped on a participant when answers are submitted.
#[derive(Debug, Clone)]
pub struct Completion {
    pub answers: Vec<SubmittedAnswer>,
    pub total_score: u32,
    pub max_score: u32,
    pub completed_at: DateTime<Utc>,
}

/// Persistence layer.
///
/// Ownership checks are done by callers; lookups by id are unscoped.
/// Participant transitions are conditional on the current status and report
/// whether the row changed, so concurrent callers cannot both win.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    // Examiners
    async fn create_examiner(&self, examiner: Examiner) -> Result<Examiner, AppError>;
    async fn get_examiner(&self, id: Uuid) -> Result<Option<Examiner>, AppError>;
    async fn get_examiner_by_username(&self, username: &str) -> Result<Option<Examiner>, AppError>;

    // Question bank
    async fn insert_question(&self, question: Question) -> Result<Question, AppError>;
    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError>;
    async fn list_questions(&self, owner_id: Uuid) -> Result<Vec<Question>, AppError>;
    async fn update_question(&self, question: Question) -> Result<bool, AppError>;
    /// Deletes a question and removes its id from every pool.
    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError>;

    // Pools
    /// Fails with `Conflict` when the owner already has a pool of that name.
    async fn insert_pool(&self, pool: Pool) -> Result<Pool, AppError>;
    async fn get_pool(&self, id: Uuid) -> Result<Option<Pool>, AppError>;
    async fn list_pools(&self, owner_id: Uuid) -> Result<Vec<Pool>, AppError>;
    async fn update_pool(&self, pool: Pool) -> Result<bool, AppError>;
    /// Deletes a pool. With `detach_from_templates` its selections are removed
    /// from referencing templates in the same unit of work, and templates left
    /// without any selection are deleted.
    async fn delete_pool(&self, id: Uuid, detach_from_templates: bool) -> Result<bool, AppError>;

    // Templates
    async fn insert_template(&self, template: Template) -> Result<Template, AppError>;
    async fn get_template(&self, id: Uuid) -> Result<Option<Template>, AppError>;
    async fn list_templates(&self, owner_id: Uuid) -> Result<Vec<Template>, AppError>;
    async fn update_template(&self, template: Template) -> Result<bool, AppError>;
    async fn delete_template(&self, id: Uuid) -> Result<bool, AppError>;
    async fn templates_referencing_pool(&self, pool_id: Uuid) -> Result<Vec<Template>, AppError>;

    // Sessions
    /// Stores a session together with all its participants, or nothing.
    async fn create_session(
        &self,
        session: Session,
        participants: Vec<ParticipantInstance>,
    ) -> Result<Session, AppError>;
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, AppError>;
    async fn list_sessions(&self, owner_id: Uuid) -> Result<Vec<Session>, AppError>;
    async fn set_session_status(&self, id: Uuid, status: SessionStatus) -> Result<bool, AppError>;
    /// Re-derives the session status from its participants' current statuses
    /// and stores it, atomically. `None` if the session does not exist.
    async fn sync_session_status(&self, id: Uuid) -> Result<Option<SessionStatus>, AppError>;

    // Participants
    async fn get_participant(&self, access_code: &str) -> Result<Option<ParticipantInstance>, AppError>;
    /// Participants in access-code order of the session.
    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<ParticipantInstance>, AppError>;
    /// `not_started → in_progress`.
    async fn start_participant(
        &self,
        access_code: &str,
        identifier: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;
    /// `in_progress → completed`.
    async fn complete_participant(&self, access_code: &str, completion: Completion) -> Result<bool, AppError>;
    /// `not_started → expired`.
    async fn expire_participant(&self, access_code: &str) -> Result<bool, AppError>;
}

/// Builds the store selected by `config.store_backend`.
pub async fn connect(config: &Config) -> Result<DynStore, AppError> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                AppError::InternalServerError("DATABASE_URL is not configured".to_string())
            })?;
            let store = PgStore::connect(url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
    }
}
