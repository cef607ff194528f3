// src/store/memory.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Completion, Store};
use crate::{
    engine::lifecycle::{can_transition, derive_session_status},
    error::AppError,
    models::{
        examiner::Examiner,
        participant::{ParticipantInstance, ParticipantStatus},
        pool::Pool,
        question::Question,
        session::{Session, SessionStatus},
        template::Template,
    },
};

#[derive(Default)]
struct Tables {
    examiners: HashMap<Uuid, Examiner>,
    questions: HashMap<Uuid, Question>,
    pools: HashMap<Uuid, Pool>,
    templates: HashMap<Uuid, Template>,
    sessions: HashMap<Uuid, Session>,
    participants: HashMap<String, ParticipantInstance>,
}

impl Tables {
    fn pool_name_taken(&self, owner_id: Uuid, name: &str, except: Option<Uuid>) -> bool {
        self.pools
            .values()
            .any(|p| p.owner_id == owner_id && p.name == name && Some(p.id) != except)
    }

    fn transition(
        &mut self,
        access_code: &str,
        to: ParticipantStatus,
        apply: impl FnOnce(&mut ParticipantInstance),
    ) -> bool {
        match self.participants.get_mut(access_code) {
            Some(p) if can_transition(p.status, to) => {
                p.status = to;
                apply(p);
                true
            }
            _ => false,
        }
    }
}

/// Map-backed store for development and tests.
///
/// All tables sit behind one lock, so every method is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Newest first, like the `ORDER BY created_at DESC` of the SQL store.
fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn create_examiner(&self, examiner: Examiner) -> Result<Examiner, AppError> {
        let mut t = self.tables.write().await;
        if t.examiners.values().any(|e| e.username == examiner.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                examiner.username
            )));
        }
        t.examiners.insert(examiner.id, examiner.clone());
        Ok(examiner)
    }

    async fn get_examiner(&self, id: Uuid) -> Result<Option<Examiner>, AppError> {
        Ok(self.tables.read().await.examiners.get(&id).cloned())
    }

    async fn get_examiner_by_username(&self, username: &str) -> Result<Option<Examiner>, AppError> {
        let t = self.tables.read().await;
        Ok(t.examiners.values().find(|e| e.username == username).cloned())
    }

    async fn insert_question(&self, question: Question) -> Result<Question, AppError> {
        self.tables
            .write()
            .await
            .questions
            .insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: Uuid) -> Result<Option<Question>, AppError> {
        Ok(self.tables.read().await.questions.get(&id).cloned())
    }

    async fn list_questions(&self, owner_id: Uuid) -> Result<Vec<Question>, AppError> {
        let t = self.tables.read().await;
        let items: Vec<Question> = t
            .questions
            .values()
            .filter(|q| q.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(items, |q| q.created_at))
    }

    async fn update_question(&self, question: Question) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        match t.questions.get_mut(&question.id) {
            Some(existing) => {
                *existing = question;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_question(&self, id: Uuid) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        if t.questions.remove(&id).is_none() {
            return Ok(false);
        }
        for pool in t.pools.values_mut() {
            pool.question_ids.retain(|q| *q != id);
        }
        Ok(true)
    }

    async fn insert_pool(&self, pool: Pool) -> Result<Pool, AppError> {
        let mut t = self.tables.write().await;
        if t.pool_name_taken(pool.owner_id, &pool.name, None) {
            return Err(AppError::Conflict(format!(
                "A pool named '{}' already exists",
                pool.name
            )));
        }
        t.pools.insert(pool.id, pool.clone());
        Ok(pool)
    }

    async fn get_pool(&self, id: Uuid) -> Result<Option<Pool>, AppError> {
        Ok(self.tables.read().await.pools.get(&id).cloned())
    }

    async fn list_pools(&self, owner_id: Uuid) -> Result<Vec<Pool>, AppError> {
        let t = self.tables.read().await;
        let items: Vec<Pool> = t
            .pools
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(items, |p| p.created_at))
    }

    async fn update_pool(&self, pool: Pool) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        if !t.pools.contains_key(&pool.id) {
            return Ok(false);
        }
        if t.pool_name_taken(pool.owner_id, &pool.name, Some(pool.id)) {
            return Err(AppError::Conflict(format!(
                "A pool named '{}' already exists",
                pool.name
            )));
        }
        t.pools.insert(pool.id, pool);
        Ok(true)
    }

    async fn delete_pool(&self, id: Uuid, detach_from_templates: bool) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        if t.pools.remove(&id).is_none() {
            return Ok(false);
        }
        if detach_from_templates {
            let now = Utc::now();
            for template in t.templates.values_mut().filter(|tpl| tpl.references_pool(id)) {
                template.pool_selections.retain(|s| s.pool_id != id);
                template.updated_at = now;
            }
            // A template without selections can never be launched.
            t.templates.retain(|_, tpl| !tpl.pool_selections.is_empty());
        }
        Ok(true)
    }

    async fn insert_template(&self, template: Template) -> Result<Template, AppError> {
        self.tables
            .write()
            .await
            .templates
            .insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<Template>, AppError> {
        Ok(self.tables.read().await.templates.get(&id).cloned())
    }

    async fn list_templates(&self, owner_id: Uuid) -> Result<Vec<Template>, AppError> {
        let t = self.tables.read().await;
        let items: Vec<Template> = t
            .templates
            .values()
            .filter(|tpl| tpl.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(items, |tpl| tpl.created_at))
    }

    async fn update_template(&self, template: Template) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        match t.templates.get_mut(&template.id) {
            Some(existing) => {
                *existing = template;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_template(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.tables.write().await.templates.remove(&id).is_some())
    }

    async fn templates_referencing_pool(&self, pool_id: Uuid) -> Result<Vec<Template>, AppError> {
        let t = self.tables.read().await;
        let items: Vec<Template> = t
            .templates
            .values()
            .filter(|tpl| tpl.references_pool(pool_id))
            .cloned()
            .collect();
        Ok(newest_first(items, |tpl| tpl.created_at))
    }

    async fn create_session(
        &self,
        session: Session,
        participants: Vec<ParticipantInstance>,
    ) -> Result<Session, AppError> {
        let mut t = self.tables.write().await;
        if participants
            .iter()
            .any(|p| t.participants.contains_key(&p.access_code))
        {
            return Err(AppError::Conflict(
                "Access code collision, please retry".to_string(),
            ));
        }
        for participant in participants {
            t.participants
                .insert(participant.access_code.clone(), participant);
        }
        t.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, AppError> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, owner_id: Uuid) -> Result<Vec<Session>, AppError> {
        let t = self.tables.read().await;
        let items: Vec<Session> = t
            .sessions
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        Ok(newest_first(items, |s| s.created_at))
    }

    async fn set_session_status(&self, id: Uuid, status: SessionStatus) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        match t.sessions.get_mut(&id) {
            Some(session) => {
                session.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn sync_session_status(&self, id: Uuid) -> Result<Option<SessionStatus>, AppError> {
        let mut t = self.tables.write().await;
        let Some(session) = t.sessions.get(&id) else {
            return Ok(None);
        };

        let statuses: Vec<ParticipantStatus> = session
            .access_codes
            .iter()
            .filter_map(|code| t.participants.get(code).map(|p| p.status))
            .collect();
        let derived = derive_session_status(session.status, &statuses);

        if let Some(session) = t.sessions.get_mut(&id) {
            session.status = derived;
        }
        Ok(Some(derived))
    }

    async fn get_participant(&self, access_code: &str) -> Result<Option<ParticipantInstance>, AppError> {
        Ok(self.tables.read().await.participants.get(access_code).cloned())
    }

    async fn list_participants(&self, session_id: Uuid) -> Result<Vec<ParticipantInstance>, AppError> {
        let t = self.tables.read().await;
        let Some(session) = t.sessions.get(&session_id) else {
            return Ok(Vec::new());
        };
        Ok(session
            .access_codes
            .iter()
            .filter_map(|code| t.participants.get(code).cloned())
            .collect())
    }

    async fn start_participant(
        &self,
        access_code: &str,
        identifier: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        Ok(t.transition(access_code, ParticipantStatus::InProgress, |p| {
            if identifier.is_some() {
                p.identifier = identifier;
            }
            p.started_at = Some(started_at);
        }))
    }

    async fn complete_participant(&self, access_code: &str, completion: Completion) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        Ok(t.transition(access_code, ParticipantStatus::Completed, |p| {
            p.answers = completion.answers;
            p.total_score = Some(completion.total_score);
            p.max_score = Some(completion.max_score);
            p.completed_at = Some(completion.completed_at);
        }))
    }

    async fn expire_participant(&self, access_code: &str) -> Result<bool, AppError> {
        let mut t = self.tables.write().await;
        Ok(t.transition(access_code, ParticipantStatus::Expired, |_| {}))
    }
}
