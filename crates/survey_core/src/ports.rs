//! crates/survey_core/src/ports.rs
//!
//! Defines the service contracts (traits) the survey core depends on.
//! These traits form the boundary of the hexagonal architecture: the chat
//! gateway and the survey repository live outside the core.

use async_trait::async_trait;

use crate::domain::{ApiKey, CompletedSurvey, Question};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A snapshot of the chat gateway connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayStatus {
    pub connected: bool,
    pub bot_tag: Option<String>,
    pub bot_id: Option<String>,
    pub relay_channel: Option<RelayChannel>,
}

/// The channel web-form messages are relayed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayChannel {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Sends a direct message to an end user.
    ///
    /// Fails with `NotFound` when the user cannot be resolved and with
    /// `Unavailable` when the gateway is not connected.
    async fn send_direct_message(&self, owner_id: &str, text: &str) -> PortResult<()>;

    /// Posts a message into the relay channel.
    async fn send_relay_message(&self, text: &str) -> PortResult<()>;

    fn status(&self) -> GatewayStatus;
}

#[async_trait]
pub trait SurveyRepository: Send + Sync {
    // --- API Keys ---
    async fn create_api_key(&self) -> PortResult<ApiKey>;

    async fn api_key_exists(&self, key: &str) -> PortResult<bool>;

    // --- Question Sets ---
    /// Replaces the question set of `key`. `NotFound` if the key is unknown.
    async fn save_questions(&self, key: &str, questions: &[Question]) -> PortResult<()>;

    async fn get_questions(&self, key: &str) -> PortResult<Vec<Question>>;

    // --- Completed Surveys ---
    async fn save_completed_survey(&self, survey: &CompletedSurvey) -> PortResult<()>;

    /// Completed surveys for `key`, oldest first.
    async fn list_completed_surveys(&self, key: &str) -> PortResult<Vec<CompletedSurvey>>;
}
