// src/store/postgres.rs

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, PgPool,
    postgres::{PgPoolOptions, PgQueryResult},
    types::Json,
};
use uuid::Uuid;

use super::{Completion, Store};
use crate::{
    engine::lifecycle::derive_session_status,
    error::AppError,
    models::{
        examiner::Examiner,
        participant::{DrawnSection, ParticipantInstance, ParticipantStatus, SubmittedAnswer},
        pool::Pool,
        question::{Answer, Question},
        session::{Session, SessionStatus},
        template::{PoolSelection, Template},
    },
};

/// Postgres-backed store. Nested lists are kept in JSONB columns.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connects with retry, since the database may start after the server.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let mut retry_count = 0;
        let pool = loop {
            match PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect(database_url)
                .await
            {
                Ok(pool) => break pool,
                Err(e) => {
                    retry_count += 1;
                    if retry_count > 5 {
                        return Err(AppError::InternalServerError(format!(
                            "Failed to connect to database after 5 retries: {}",
                            e
                        )));
                    }
                    tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        };

        tracing::info!("Database connected...");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        tracing::info!("Running migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::InternalServerError(format!("Migration failed: {}", e)))?;
        tracing::info!("Migrations applied successfully.");
        Ok(())
    }
}

/// Maps a unique violation to `Conflict`, anything else to a 500.
fn conflict_on_unique(e: sqlx::Error, message: String) -> AppError {
    let unique = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
    if unique {
        AppError::Conflict(message)
    } else {
        AppError::from(e)
    }
}

fn changed(result: PgQueryResult) -> bool {
    result.rows_affected() > 0
}

fn to_db_int(value: u32) -> Result<i32, AppError> {
    i32::try_from(value).map_err(|_| AppError::BadRequest(format!("{} is out of range", value)))
}

fn from_db_int(value: i32) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::InternalServerError(format!("negative value {} in database", value)))
}

#[derive(FromRow)]
struct ExaminerRow {
    id: Uuid,
    username: String,
    password: String,
    created_at: DateTime<Utc>,
}

impl From<ExaminerRow> for Examiner {
    fn from(row: ExaminerRow) -> Self {
        Examiner {
            id: row.id,
            username: row.username,
            password: row.password,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    owner_id: Uuid,
    text: String,
    tags: Json<Vec<String>>,
    answers: Json<Vec<Answer>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            owner_id: row.owner_id,
            text: row.text,
            tags: row.tags.0,
            answers: row.answers.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PoolRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: Option<String>,
    question_ids: Json<Vec<Uuid>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PoolRow> for Pool {
    fn from(row: PoolRow) -> Self {
        Pool {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            question_ids: row.question_ids.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TemplateRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: Option<String>,
    pool_selections: Json<Vec<PoolSelection>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Template {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            pool_selections: row.pool_selections.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    owner_id: Uuid,
    template_id: Uuid,
    name: String,
    access_codes: Json<Vec<String>>,
    time_limit_minutes: i32,
    available_until: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = AppError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            owner_id: row.owner_id,
            template_id: row.template_id,
            name: row.name,
            access_codes: row.access_codes.0,
            time_limit_minutes: from_db_int(row.time_limit_minutes)?,
            available_until: row.available_until,
            status: row.status.parse().map_err(AppError::InternalServerError)?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct ParticipantRow {
    session_id: Uuid,
    access_code: String,
    identifier: Option<String>,
    sections: Json<Vec<DrawnSection>>,
    answers: Json<Vec<SubmittedAnswer>>,
    status: String,
    total_score: Option<i32>,
    max_score: Option<i32>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ParticipantRow> for ParticipantInstance {
    type Error = AppError;

    fn try_from(row: ParticipantRow) -> Result<Self, Self::Error> {
        Ok(ParticipantInstance {
            session_id: row.session_id,
            access_code: row.access_code,
            identifier: row.identifier,
            sections: row.sections.0,
            answers: row.answers.0,
            status: row.status.parse().map_err(AppError::InternalServerError)?,
            total_score: row.total_score.map(from_db_int).transpose()?,
            max_score: row.max_score.map(from_db_int).transpose()?,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

const QUESTION_COLUMNS: &str = "id, owner_id, text, tags, answers, created_at, updated_at";
const POOL_COLUMNS: &str = "id, owner_id, name, description, question_ids, created_at, updated_at";
const TEMPLATE_COLUMNS: &str =
    "id, owner_id, name, description, pool_selections, created_at, updated_at";
const SESSION_COLUMNS: &str = "id, owner_id, template_id, name, access_codes, time_limit_minutes, \
     available_until, status, created_at";
const PARTICIPANT_COLUMNS: &str = "session_id, access_code, identifier, sections, answers, status, \
     total_score, max_score, started_at, completed_at";

#[async_trait::async_trait]
impl Store for PgStore {
    async fn create_examiner(&self, examiner: Examiner) -> Result<Examiner, AppError> {
        sqlx::query(
            "INSERT INTO examiners (id, username, password, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(examiner.id)
        .bind(&examiner.username)
        .bind(&examiner.password)
        .bind(examiner.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on_unique(e, format!("Username '{}' already exists", examiner.username))
        })?;
        Ok(examiner)
    }

    async fn get_examiner(&self, id: Uuid) -> Result<Option<Examiner>, AppError> {
        let row = sqlx::query_as::<_, ExaminerRow>(
            "SELECT id, username, password, created_at FROM examiners WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Examiner::from))
    }

    async fn get_examiner_by_username(&self, username: &str) -> Result<Option<Examiner>, AppError> {
        let row = sqlx::query_as::<_, ExaminerRow>(
            "SELECT id, username, password, created_at FROM examiners WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Examiner::from))
    }

    async fn insert_question(&self, question: Question) -> Result<Question, AppError> {
        sqlx::query(
            r#"
            INSERT INTO questions (id, owner_id, text, tags, answers, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(question.id)
        .bind(question.owner_id)
        .bind(&question.text)
        .bind(Json(&question.tags))
        .bind(Json(&question.answers))
        .bind(question.created_at)
        .bind(question.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create question: {:?}", e);
            AppError::from(e)
        })?;
        Ok(question)
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        let row = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Question::from))
    }

    async fn list_questions(&self, owner_id: Uuid) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, QuestionRow>(&format!(
            "SELECT {} FROM questions WHERE owner_id = $1 ORDER BY created_at DESC",
            QUESTION_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Question::from).collect())
    }

    async fn update_question(&self, question: Question) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE questions SET text = $2, tags = $3, answers = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(question.id)
        .bind(&question.text)
        .bind(Json(&question.tags))
        .bind(Json(&question.answers))
        .bind(question.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(changed(result))
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if changed(result) {
            // JSONB `-` removes a string element; `?` tests membership.
            sqlx::query(
                "UPDATE pools SET question_ids = question_ids - $1::text, updated_at = NOW() \
                 WHERE question_ids ? $1::text",
            )
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(true)
        } else {
            tx.rollback().await?;
            Ok(false)
        }
    }

    async fn insert_pool(&self, pool: Pool) -> Result<Pool, AppError> {
        sqlx::query(
            r#"
            INSERT INTO pools (id, owner_id, name, description, question_ids, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(pool.id)
        .bind(pool.owner_id)
        .bind(&pool.name)
        .bind(&pool.description)
        .bind(Json(&pool.question_ids))
        .bind(pool.created_at)
        .bind(pool.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("A pool named '{}' already exists", pool.name)))?;
        Ok(pool)
    }

    async fn get_pool(&self, id: Uuid) -> Result<Option<Pool>, AppError> {
        let row = sqlx::query_as::<_, PoolRow>(&format!(
            "SELECT {} FROM pools WHERE id = $1",
            POOL_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Pool::from))
    }

    async fn list_pools(&self, owner_id: Uuid) -> Result<Vec<Pool>, AppError> {
        let rows = sqlx::query_as::<_, PoolRow>(&format!(
            "SELECT {} FROM pools WHERE owner_id = $1 ORDER BY created_at DESC",
            POOL_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Pool::from).collect())
    }

    async fn update_pool(&self, pool: Pool) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE pools SET name = $2, description = $3, question_ids = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(pool.id)
        .bind(&pool.name)
        .bind(&pool.description)
        .bind(Json(&pool.question_ids))
        .bind(pool.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, format!("A pool named '{}' already exists", pool.name)))?;
        Ok(changed(result))
    }

    async fn delete_pool(&self, id: Uuid, detach_from_templates: bool) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM pools WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if !changed(result) {
            tx.rollback().await?;
            return Ok(false);
        }

        if detach_from_templates {
            let probe = serde_json::json!([{ "pool_id": id }]);
            let rows = sqlx::query_as::<_, TemplateRow>(&format!(
                "SELECT {} FROM templates WHERE pool_selections @> $1 FOR UPDATE",
                TEMPLATE_COLUMNS
            ))
            .bind(probe)
            .fetch_all(&mut *tx)
            .await?;

            for row in rows {
                let mut template = Template::from(row);
                template.pool_selections.retain(|s| s.pool_id != id);

                // A template without selections can never be launched.
                if template.pool_selections.is_empty() {
                    sqlx::query("DELETE FROM templates WHERE id = $1")
                        .bind(template.id)
                        .execute(&mut *tx)
                        .await?;
                    continue;
                }

                sqlx::query(
                    "UPDATE templates SET pool_selections = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(template.id)
                .bind(Json(&template.pool_selections))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn insert_template(&self, template: Template) -> Result<Template, AppError> {
        sqlx::query(
            r#"
            INSERT INTO templates (id, owner_id, name, description, pool_selections, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(template.id)
        .bind(template.owner_id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(Json(&template.pool_selections))
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<Template>, AppError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM templates WHERE id = $1",
            TEMPLATE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Template::from))
    }

    async fn list_templates(&self, owner_id: Uuid) -> Result<Vec<Template>, AppError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM templates WHERE owner_id = $1 ORDER BY created_at DESC",
            TEMPLATE_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Template::from).collect())
    }

    async fn update_template(&self, template: Template) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE templates SET name = $2, description = $3, pool_selections = $4, updated_at = $5 \
             WHERE id = $1",
        )
        .bind(template.id)
        .bind(&template.name)
        .bind(&template.description)
        .bind(Json(&template.pool_selections))
        .bind(template.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(changed(result))
    }

    async fn delete_template(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(changed(result))
    }

    async fn templates_referencing_pool(&self, pool_id: Uuid) -> Result<Vec<Template>, AppError> {
        let probe = serde_json::json!([{ "pool_id": pool_id }]);
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM templates WHERE pool_selections @> $1 ORDER BY created_at DESC",
            TEMPLATE_COLUMNS
        ))
        .bind(probe)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Template::from).collect())
    }

    async fn create_session(
        &self,
        session: Session,
        participants: Vec<ParticipantInstance>,
    ) -> Result<Session, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sessions
            (id, owner_id, template_id, name, access_codes, time_limit_minutes, available_until, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id)
        .bind(session.owner_id)
        .bind(session.template_id)
        .bind(&session.name)
        .bind(Json(&session.access_codes))
        .bind(to_db_int(session.time_limit_minutes)?)
        .bind(session.available_until)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, p) in participants.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO participants
                (access_code, session_id, position, identifier, sections, answers, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(&p.access_code)
            .bind(p.session_id)
            .bind(position as i32)
            .bind(&p.identifier)
            .bind(Json(&p.sections))
            .bind(Json(&p.answers))
            .bind(p.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| conflict_on_unique(e, "Access code collision, please retry".to_string()))?;
        }

        tx.commit().await?;
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM sessions WHERE id = $1",
            SESSION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Session::try_from).transpose()
    }

    async fn list_sessions(&self, owner_id: Uuid) -> Result<Vec<Session>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM sessions WHERE owner_id = $1 ORDER BY created_at DESC",
            SESSION_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Session::try_from).collect()
    }

    async fn set_session_status(&self, id: Uuid, status: SessionStatus) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE sessions SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(changed(result))
    }

    async fn sync_session_status(&self, id: Uuid) -> Result<Option<SessionStatus>, AppError> {
        let mut tx = self.pool.begin().await?;

        // The row lock serializes concurrent re-derivations of one session.
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM sessions WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(None);
        };
        let current: SessionStatus = current.parse().map_err(AppError::InternalServerError)?;

        let statuses = sqlx::query_scalar::<_, String>(
            "SELECT status FROM participants WHERE session_id = $1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|s| s.parse::<ParticipantStatus>().map_err(AppError::InternalServerError))
        .collect::<Result<Vec<_>, _>>()?;

        let derived = derive_session_status(current, &statuses);
        if derived != current {
            sqlx::query("UPDATE sessions SET status = $2 WHERE id = $1")
                .bind(id)
                .bind(derived.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(derived))
    }

    async fn get_participant(&self, access_code: &str) -> Result<Option<ParticipantInstance>, AppError> {
        let row = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {} FROM participants WHERE access_code = $1",
            PARTICIPANT_COLUMNS
        ))
        .bind(access_code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ParticipantInstance::try_from).transpose()
    }

    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<ParticipantInstance>, AppError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(&format!(
            "SELECT {} FROM participants WHERE session_id = $1 ORDER BY position",
            PARTICIPANT_COLUMNS
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ParticipantInstance::try_from).collect()
    }

    async fn start_participant(
        &self,
        access_code: &str,
        identifier: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE participants \
             SET status = $2, identifier = COALESCE($3, identifier), started_at = $4 \
             WHERE access_code = $1 AND status = $5",
        )
        .bind(access_code)
        .bind(ParticipantStatus::InProgress.as_str())
        .bind(identifier)
        .bind(started_at)
        .bind(ParticipantStatus::NotStarted.as_str())
        .execute(&self.pool)
        .await?;
        Ok(changed(result))
    }

    async fn complete_participant(&self, access_code: &str, completion: Completion) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE participants \
             SET status = $2, answers = $3, total_score = $4, max_score = $5, completed_at = $6 \
             WHERE access_code = $1 AND status = $7",
        )
        .bind(access_code)
        .bind(ParticipantStatus::Completed.as_str())
        .bind(Json(&completion.answers))
        .bind(to_db_int(completion.total_score)?)
        .bind(to_db_int(completion.max_score)?)
        .bind(completion.completed_at)
        .bind(ParticipantStatus::InProgress.as_str())
        .execute(&self.pool)
        .await?;
        Ok(changed(result))
    }

    async fn expire_participant(&self, access_code: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE participants SET status = $2 WHERE access_code = $1 AND status = $3",
        )
        .bind(access_code)
        .bind(ParticipantStatus::Expired.as_str())
        .bind(ParticipantStatus::NotStarted.as_str())
        .execute(&self.pool)
        .await?;
        Ok(changed(result))
    }
}
