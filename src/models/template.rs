// src/models/template.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// How many questions to draw from one pool, and what each is worth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PoolSelection {
    pub pool_id: Uuid,
    #[validate(range(min = 1, max = 500, message = "questions_to_draw must be between 1 and 500"))]
    pub questions_to_draw: u32,
    #[validate(range(min = 1, max = 1000, message = "points must be between 1 and 1000"))]
    pub points: u32,
}

/// Represents the 'templates' table in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub pool_selections: Vec<PoolSelection>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Template {
    /// Number of questions in every instance drawn from this template.
    pub fn total_questions(&self) -> u32 {
        self.pool_selections.iter().map(|s| s.questions_to_draw).sum()
    }

    /// Maximum score of every instance drawn from this template.
    pub fn total_points(&self) -> u32 {
        self.pool_selections
            .iter()
            .map(|s| s.questions_to_draw * s.points)
            .sum()
    }

    pub fn references_pool(&self, pool_id: Uuid) -> bool {
        self.pool_selections.iter().any(|s| s.pool_id == pool_id)
    }
}

/// DTO for creating a new template.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTemplateRequest {
    #[validate(length(min = 1, max = 100, message = "Template name must be between 1 and 100 chars"))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "A template needs between 1 and 50 pool selections"), nested)]
    pub pool_selections: Vec<PoolSelection>,
}

/// DTO for updating a template. `pool_selections` replaces the whole list.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTemplateRequest {
    #[validate(length(min = 1, max = 100, message = "Template name must be between 1 and 100 chars"))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "A template needs between 1 and 50 pool selections"), nested)]
    pub pool_selections: Option<Vec<PoolSelection>>,
}

/// Template as returned by the API, with its derived totals.
#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    #[serde(flatten)]
    pub template: Template,
    pub total_questions: u32,
    pub total_points: u32,
}

impl From<Template> for TemplateResponse {
    fn from(template: Template) -> Self {
        let total_questions = template.total_questions();
        let total_points = template.total_points();
        Self {
            template,
            total_questions,
            total_points,
        }
    }
}
