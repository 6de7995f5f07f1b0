//! crates/survey_core/src/error.rs
//!
//! Errors raised by the survey state machine itself.

/// Errors returned when starting or seeding a survey.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurveyError {
    #[error("A survey is already active for user {owner_id}")]
    AlreadyActive { owner_id: String },
    #[error("A survey needs at least one question")]
    NoQuestions,
    #[error("Question {index} is invalid: {reason}")]
    InvalidQuestion { index: usize, reason: String },
}
