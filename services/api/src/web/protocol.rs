//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between web clients (dashboard, widgets)
//! and the API server.

use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use survey_core::domain::{CompletedSurvey, Format, Question, ValidationKind};
use survey_core::ports::PortError;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Errors
//=========================================================================================

/// The JSON body returned with every non-2xx response.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
}

impl ErrorResponse {
    pub fn reply(
        status: StatusCode,
        error: impl Into<String>,
        details: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        (
            status,
            Json(ErrorResponse {
                error: error.into(),
                details: details.into(),
            }),
        )
    }

    /// Maps a port failure onto the HTTP status the boundary promises.
    pub fn from_port_error(e: &PortError, context: &str) -> (StatusCode, Json<ErrorResponse>) {
        let status = match e {
            PortError::NotFound(_) => StatusCode::NOT_FOUND,
            PortError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PortError::Unauthorized => StatusCode::UNAUTHORIZED,
            PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::reply(status, context, e.to_string())
    }
}

//=========================================================================================
// Question Authoring
//=========================================================================================

/// A question as submitted by a survey author.
///
/// `validation` may be omitted, in which case it is derived from the wording
/// once, here, and stored with the question.
#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInput {
    pub text: String,
    #[schema(value_type = String, example = "number")]
    pub format: Format,
    #[serde(default)]
    pub options: Option<BTreeMap<String, String>>,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "email")]
    pub validation: Option<ValidationKind>,
}

impl QuestionInput {
    pub fn into_question(self) -> Question {
        let validation = self
            .validation
            .unwrap_or_else(|| ValidationKind::infer_from_text(&self.text));
        let options = self.options.map(|options| {
            options
                .into_iter()
                .map(|(label, choice)| (label.trim().to_uppercase(), choice))
                .collect()
        });
        Question {
            text: self.text.trim().to_string(),
            format: self.format,
            options,
            validation,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKeyResponse {
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveQuestionsRequest {
    pub api_key: Option<String>,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct ApiKeyQuery {
    pub api_key: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct QuestionsResponse {
    #[schema(value_type = Vec<Object>)]
    pub questions: Vec<Question>,
}

//=========================================================================================
// Surveys
//=========================================================================================

/// Starts a DM survey, either from inline questions or a saved question set.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartSurveyRequest {
    #[serde(alias = "userId", alias = "user_id")]
    pub owner_id: Option<String>,
    #[serde(alias = "api_key")]
    pub api_key: Option<String>,
    pub questions: Option<Vec<QuestionInput>>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartSurveyResponse {
    pub success: bool,
    pub owner_id: String,
    pub first_prompt: String,
    pub total_questions: usize,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SurveyProgressResponse {
    pub owner_id: String,
    pub answered: usize,
    pub total: usize,
    pub current_question: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerView {
    pub question: String,
    pub answer: String,
    pub answered_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSurveyView {
    pub id: Uuid,
    pub owner_id: String,
    pub answers: Vec<AnswerView>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl From<CompletedSurvey> for CompletedSurveyView {
    fn from(survey: CompletedSurvey) -> Self {
        Self {
            id: survey.id,
            owner_id: survey.owner_id,
            answers: survey
                .answers
                .into_iter()
                .map(|a| AnswerView {
                    question: a.question_text,
                    answer: a.raw_response,
                    answered_at: a.answered_at,
                })
                .collect(),
            started_at: survey.started_at,
            completed_at: survey.completed_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CompletedSurveysResponse {
    pub success: bool,
    pub data: Vec<CompletedSurveyView>,
}

//=========================================================================================
// Chat Relay and Health
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub username: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub author: Option<String>,
    pub is_bot: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct RelayChannelView {
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub bot_connected: bool,
    pub uptime_secs: u64,
    pub bot_tag: Option<String>,
    pub bot_id: Option<String>,
    pub relay_channel: Option<RelayChannelView>,
    pub active_sessions: usize,
}
