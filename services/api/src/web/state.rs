//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::relay::RelayHub;
use std::sync::Arc;
use std::time::Instant;
use survey_core::engine::SurveyEngine;
use survey_core::ports::{MessageGateway, SurveyRepository};

/// The shared application state, created once at startup and passed to all
/// handlers and to the Discord event handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: SurveyEngine,
    pub repository: Arc<dyn SurveyRepository>,
    pub gateway: Arc<dyn MessageGateway>,
    pub relay: RelayHub,
    pub started_at: Instant,
}
