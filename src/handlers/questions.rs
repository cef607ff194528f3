// src/handlers/questions.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    engine::filter::QuestionFilter,
    error::AppError,
    models::question::{
        Answer, AnswerInput, CreateQuestionRequest, Question, QuestionListParams,
        UpdateQuestionRequest, normalize_tags, validate_answer_set,
    },
    store::DynStore,
    utils::{html::clean_html, jwt::Claims},
};

/// Fetches a question owned by `owner_id`. Other examiners' questions are reported as missing.
pub(crate) async fn load_question(
    store: &DynStore,
    id: Uuid,
    owner_id: Uuid,
) -> Result<Question, AppError> {
    store
        .get_question(id)
        .await?
        .filter(|q| q.owner_id == owner_id)
        .ok_or(AppError::NotFound("Question not found".to_string()))
}

fn build_answers(inputs: &[AnswerInput]) -> Result<Vec<Answer>, AppError> {
    validate_answer_set(inputs)?;
    Ok(inputs
        .iter()
        .map(|a| Answer {
            id: Uuid::new_v4(),
            text: clean_html(&a.text),
            is_correct: a.is_correct,
        })
        .collect())
}

/// Lists the examiner's questions, optionally filtered by tag and text.
pub async fn list_questions(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let owner_id = claims.examiner_id()?;
    let questions = store.list_questions(owner_id).await?;

    Ok(Json(QuestionFilter::from(&params).apply(questions)))
}

/// Creates a new question in the examiner's bank.
pub async fn create_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let owner_id = claims.examiner_id()?;

    let now = Utc::now();
    let question = Question {
        id: Uuid::new_v4(),
        owner_id,
        text: clean_html(&payload.text),
        tags: normalize_tags(&payload.tags),
        answers: build_answers(&payload.answers)?,
        created_at: now,
        updated_at: now,
    };

    let question = store.insert_question(question).await?;
    tracing::debug!(question_id = %question.id, "Question created");

    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn get_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let question = load_question(&store, id, claims.examiner_id()?).await?;
    Ok(Json(question))
}

/// Updates a question. A new answer list replaces the old one and gets fresh ids.
///
/// Launched sessions keep their own snapshot, so this never affects running tests.
pub async fn update_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let mut question = load_question(&store, id, claims.examiner_id()?).await?;

    if let Some(text) = payload.text {
        question.text = clean_html(&text);
    }
    if let Some(tags) = payload.tags {
        question.tags = normalize_tags(&tags);
    }
    if let Some(answers) = payload.answers {
        question.answers = build_answers(&answers)?;
    }
    question.updated_at = Utc::now();

    if !store.update_question(question.clone()).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(Json(question))
}

/// Deletes a question and removes it from every pool that lists it.
pub async fn delete_question(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    load_question(&store, id, claims.examiner_id()?).await?;

    if !store.delete_question(id).await? {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
