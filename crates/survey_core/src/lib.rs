pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod prompt;
pub mod store;
pub mod validator;

pub use domain::{
    check_questions, Answer, ApiKey, CompletedSurvey, Format, Question, SurveySession,
    ValidationKind,
};
pub use engine::{OutboundAction, SurveyEngine};
pub use error::SurveyError;
pub use ports::{
    GatewayStatus, MessageGateway, PortError, PortResult, RelayChannel, SurveyRepository,
};
pub use prompt::Prompt;
pub use store::{InMemorySessionStore, SessionFate, SessionStore};
pub use validator::{validate, ValidationErrorKind, ValidationFailure, ValidationResult};
