// src/engine/filter.rs

use crate::models::question::{Question, QuestionListParams};

/// Composable filter over the question bank. Every set criterion must match.
#[derive(Debug, Default, Clone)]
pub struct QuestionFilter {
    tag: Option<String>,
    text: Option<String>,
    untagged: bool,
}

impl QuestionFilter {
    pub fn tag(mut self, tag: &str) -> Self {
        let tag = tag.trim().to_lowercase();
        self.tag = (!tag.is_empty()).then_some(tag);
        self
    }

    pub fn text(mut self, needle: &str) -> Self {
        let needle = needle.trim().to_lowercase();
        self.text = (!needle.is_empty()).then_some(needle);
        self
    }

    pub fn untagged(mut self, untagged: bool) -> Self {
        self.untagged = untagged;
        self
    }

    pub fn matches(&self, question: &Question) -> bool {
        if self.untagged && !question.tags.is_empty() {
            return false;
        }

        if let Some(tag) = &self.tag {
            if !question.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }

        if let Some(needle) = &self.text {
            if !question.text.to_lowercase().contains(needle) {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, questions: Vec<Question>) -> Vec<Question> {
        questions.into_iter().filter(|q| self.matches(q)).collect()
    }
}

impl From<&QuestionListParams> for QuestionFilter {
    fn from(params: &QuestionListParams) -> Self {
        let mut filter = QuestionFilter::default().untagged(params.untagged);
        if let Some(tag) = &params.tag {
            filter = filter.tag(tag);
        }
        if let Some(q) = &params.q {
            filter = filter.text(q);
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn question(text: &str, tags: &[&str]) -> Question {
        Question {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            text: text.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            answers: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn bank() -> Vec<Question> {
        vec![
            question("What is ownership?", &["rust", "memory"]),
            question("What is a borrow?", &["rust"]),
            question("What is a JOIN?", &["sql"]),
            question("Untagged trivia", &[]),
        ]
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert_eq!(QuestionFilter::default().apply(bank()).len(), 4);
    }

    #[test]
    fn test_filters_compose() {
        let filter = QuestionFilter::default().tag("RUST").text("borrow");
        let hits = filter.apply(bank());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "What is a borrow?");
    }

    #[test]
    fn test_untagged_and_tag_exclude_each_other() {
        assert_eq!(QuestionFilter::default().untagged(true).apply(bank()).len(), 1);
        assert!(
            QuestionFilter::default()
                .untagged(true)
                .tag("rust")
                .apply(bank())
                .is_empty()
        );
    }

    #[test]
    fn test_from_params_ignores_blank_values() {
        let params = QuestionListParams {
            tag: Some("  ".to_string()),
            q: Some("what".to_string()),
            untagged: false,
        };
        assert_eq!(QuestionFilter::from(&params).apply(bank()).len(), 3);
    }
}
