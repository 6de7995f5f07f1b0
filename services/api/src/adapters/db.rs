//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SurveyRepository` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use survey_core::domain::{Answer, ApiKey, CompletedSurvey, Question};
use survey_core::ports::{PortError, PortResult, SurveyRepository};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SurveyRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ApiKeyRecord {
    key: String,
    created_at: DateTime<Utc>,
}
impl ApiKeyRecord {
    fn to_domain(self) -> ApiKey {
        ApiKey {
            key: self.key,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionSetRecord {
    questions: Json<Vec<Question>>,
}

#[derive(FromRow)]
struct CompletedSurveyRecord {
    id: Uuid,
    api_key: Option<String>,
    owner_id: String,
    answers: Json<Vec<Answer>>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
}
impl CompletedSurveyRecord {
    fn to_domain(self) -> CompletedSurvey {
        CompletedSurvey {
            id: self.id,
            owner_id: self.owner_id,
            api_key: self.api_key,
            answers: self.answers.0,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `SurveyRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl SurveyRepository for DbAdapter {
    async fn create_api_key(&self) -> PortResult<ApiKey> {
        let generated = ApiKey::generate();
        let record = sqlx::query_as::<_, ApiKeyRecord>(
            "INSERT INTO api_keys (key, created_at) VALUES ($1, $2) RETURNING key, created_at",
        )
        .bind(&generated.key)
        .bind(generated.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn api_key_exists(&self, key: &str) -> PortResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM api_keys WHERE key = $1)")
                .bind(key)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(exists)
    }

    async fn save_questions(&self, key: &str, questions: &[Question]) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE api_keys SET questions = $1, updated_at = NOW() WHERE key = $2",
        )
        .bind(Json(questions))
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("API key {} not found", key)));
        }
        Ok(())
    }

    async fn get_questions(&self, key: &str) -> PortResult<Vec<Question>> {
        let record = sqlx::query_as::<_, QuestionSetRecord>(
            "SELECT questions FROM api_keys WHERE key = $1",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("API key {} not found", key)),
            _ => unexpected(e),
        })?;
        Ok(record.questions.0)
    }

    async fn save_completed_survey(&self, survey: &CompletedSurvey) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO completed_surveys (id, api_key, owner_id, answers, started_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(survey.id)
        .bind(survey.api_key.as_deref())
        .bind(&survey.owner_id)
        .bind(Json(&survey.answers))
        .bind(survey.started_at)
        .bind(survey.completed_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_completed_surveys(&self, key: &str) -> PortResult<Vec<CompletedSurvey>> {
        let records = sqlx::query_as::<_, CompletedSurveyRecord>(
            "SELECT id, api_key, owner_id, answers, started_at, completed_at \
             FROM completed_surveys WHERE api_key = $1 ORDER BY completed_at ASC",
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let surveys = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(surveys)
    }
}
