pub mod middleware;
pub mod protocol;
pub mod relay;
pub mod rest;
pub mod state;
pub mod sweeper;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use middleware::require_api_key;
pub use relay::{chat_handler, RelayHub, RelayMessage};
pub use rest::{
    cancel_survey_handler, completed_surveys_handler, generate_key_handler, get_questions_handler,
    health_handler, save_questions_handler, start_survey_handler, survey_progress_handler,
};
pub use state::AppState;

/// Builds the API router. The Swagger UI is merged in by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no API key required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate-key", post(generate_key_handler))
        .route("/api/save-questions", post(save_questions_handler))
        .route("/api/get-questions", get(get_questions_handler))
        .route("/api/surveys/start", post(start_survey_handler))
        .route("/api/send-dm", post(start_survey_handler))
        .route(
            "/api/surveys/{owner_id}",
            get(survey_progress_handler).delete(cancel_survey_handler),
        )
        .route("/api/chat", post(chat_handler));

    // Protected routes (bearer API key required)
    let protected_routes = Router::new()
        .route("/api/completed-surveys", get(completed_surveys_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_api_key,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
