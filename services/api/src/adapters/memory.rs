//! services/api/src/adapters/memory.rs
//!
//! An in-memory `SurveyRepository`, used when no `DATABASE_URL` is configured
//! and by the HTTP tests. Nothing survives a restart.

use async_trait::async_trait;
use std::collections::HashMap;
use survey_core::domain::{ApiKey, CompletedSurvey, Question};
use survey_core::ports::{PortError, PortResult, SurveyRepository};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// API key -> its saved question set.
    question_sets: HashMap<String, Vec<Question>>,
    completed: Vec<CompletedSurvey>,
}

#[derive(Default)]
pub struct InMemorySurveyRepository {
    inner: RwLock<Inner>,
}

impl InMemorySurveyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SurveyRepository for InMemorySurveyRepository {
    async fn create_api_key(&self) -> PortResult<ApiKey> {
        let api_key = ApiKey::generate();
        self.inner
            .write()
            .await
            .question_sets
            .insert(api_key.key.clone(), Vec::new());
        Ok(api_key)
    }

    async fn api_key_exists(&self, key: &str) -> PortResult<bool> {
        Ok(self.inner.read().await.question_sets.contains_key(key))
    }

    async fn save_questions(&self, key: &str, questions: &[Question]) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        let set = inner
            .question_sets
            .get_mut(key)
            .ok_or_else(|| PortError::NotFound(format!("API key {} not found", key)))?;
        *set = questions.to_vec();
        Ok(())
    }

    async fn get_questions(&self, key: &str) -> PortResult<Vec<Question>> {
        self.inner
            .read()
            .await
            .question_sets
            .get(key)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("API key {} not found", key)))
    }

    async fn save_completed_survey(&self, survey: &CompletedSurvey) -> PortResult<()> {
        self.inner.write().await.completed.push(survey.clone());
        Ok(())
    }

    async fn list_completed_surveys(&self, key: &str) -> PortResult<Vec<CompletedSurvey>> {
        Ok(self
            .inner
            .read()
            .await
            .completed
            .iter()
            .filter(|survey| survey.api_key.as_deref() == Some(key))
            .cloned()
            .collect())
    }
}
