//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    middleware::AuthenticatedKey,
    protocol::{
        ApiKeyQuery, ChatRequest, ChatResponse, CompletedSurveyView, CompletedSurveysResponse,
        ErrorResponse, GenerateKeyResponse, HealthResponse, QuestionInput, QuestionsResponse,
        RelayChannelView, SaveQuestionsRequest, StartSurveyRequest, StartSurveyResponse,
        SuccessResponse, SurveyProgressResponse,
    },
    relay,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use std::sync::Arc;
use survey_core::domain::{check_questions, Question};
use survey_core::error::SurveyError;
use tracing::{error, info, warn};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_key_handler,
        save_questions_handler,
        get_questions_handler,
        start_survey_handler,
        survey_progress_handler,
        cancel_survey_handler,
        completed_surveys_handler,
        relay::chat_handler,
        health_handler,
    ),
    components(
        schemas(
            ErrorResponse, GenerateKeyResponse, SaveQuestionsRequest, QuestionInput,
            SuccessResponse, QuestionsResponse, StartSurveyRequest, StartSurveyResponse,
            SurveyProgressResponse, CompletedSurveysResponse, ChatRequest, ChatResponse,
            HealthResponse
        )
    ),
    tags(
        (name = "Survey Bot API", description = "Question sets, Discord DM surveys and the web-form chat relay.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn survey_error(e: &SurveyError) -> HandlerError {
    match e {
        SurveyError::AlreadyActive { .. } => {
            ErrorResponse::reply(StatusCode::CONFLICT, "Survey already active", e.to_string())
        }
        SurveyError::NoQuestions | SurveyError::InvalidQuestion { .. } => {
            ErrorResponse::reply(StatusCode::BAD_REQUEST, "Invalid questions", e.to_string())
        }
    }
}

fn require_field(value: Option<String>, name: &str) -> Result<String, HandlerError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            ErrorResponse::reply(
                StatusCode::BAD_REQUEST,
                "Missing required fields",
                format!("{} is required", name),
            )
        })
}

/// Resolves an API key, answering 400 when it is unknown.
async fn known_api_key(app_state: &AppState, api_key: String) -> Result<String, HandlerError> {
    match app_state.repository.api_key_exists(&api_key).await {
        Ok(true) => Ok(api_key),
        Ok(false) => Err(ErrorResponse::reply(
            StatusCode::BAD_REQUEST,
            "Invalid API key",
            "The API key is not recognised",
        )),
        Err(e) => {
            error!("Failed to look up API key: {:?}", e);
            Err(ErrorResponse::from_port_error(&e, "Failed to look up API key"))
        }
    }
}

//=========================================================================================
// API Keys and Question Sets
//=========================================================================================

/// Issue a new API key with an empty question set.
#[utoipa::path(
    post,
    path = "/api/generate-key",
    responses(
        (status = 200, description = "Key created", body = GenerateKeyResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn generate_key_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<GenerateKeyResponse>, HandlerError> {
    let api_key = app_state.repository.create_api_key().await.map_err(|e| {
        error!("Failed to create API key: {:?}", e);
        ErrorResponse::from_port_error(&e, "Failed to create API key")
    })?;
    info!("Issued a new API key");
    Ok(Json(GenerateKeyResponse {
        api_key: api_key.key,
        created_at: api_key.created_at,
    }))
}

/// Replace the question set attached to an API key.
#[utoipa::path(
    post,
    path = "/api/save-questions",
    request_body = SaveQuestionsRequest,
    responses(
        (status = 200, description = "Questions saved", body = SuccessResponse),
        (status = 400, description = "Unknown key or invalid questions", body = ErrorResponse)
    )
)]
pub async fn save_questions_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<SaveQuestionsRequest>,
) -> Result<Json<SuccessResponse>, HandlerError> {
    let api_key = require_field(req.api_key, "apiKey")?;
    let api_key = known_api_key(&app_state, api_key).await?;

    let questions: Vec<Question> = req
        .questions
        .into_iter()
        .map(QuestionInput::into_question)
        .collect();
    check_questions(&questions).map_err(|e| survey_error(&e))?;

    app_state
        .repository
        .save_questions(&api_key, &questions)
        .await
        .map_err(|e| {
            error!("Failed to save questions: {:?}", e);
            ErrorResponse::from_port_error(&e, "Failed to save questions")
        })?;

    info!("Saved {} questions", questions.len());
    Ok(Json(SuccessResponse {
        success: true,
        message: None,
    }))
}

/// Fetch the question set attached to an API key.
#[utoipa::path(
    get,
    path = "/api/get-questions",
    params(("api_key" = String, Query, description = "The survey author's API key.")),
    responses(
        (status = 200, description = "The saved questions", body = QuestionsResponse),
        (status = 400, description = "Missing or unknown key", body = ErrorResponse)
    )
)]
pub async fn get_questions_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ApiKeyQuery>,
) -> Result<Json<QuestionsResponse>, HandlerError> {
    let api_key = require_field(query.api_key, "api_key")?;
    let api_key = known_api_key(&app_state, api_key).await?;
    let questions = app_state
        .repository
        .get_questions(&api_key)
        .await
        .map_err(|e| ErrorResponse::from_port_error(&e, "Failed to load questions"))?;
    Ok(Json(QuestionsResponse { questions }))
}

//=========================================================================================
// Surveys
//=========================================================================================

/// Start a Discord DM survey for a user.
///
/// Questions come inline or, when omitted, from the set saved under `apiKey`.
#[utoipa::path(
    post,
    path = "/api/surveys/start",
    request_body = StartSurveyRequest,
    responses(
        (status = 200, description = "Survey started and first question sent", body = StartSurveyResponse),
        (status = 400, description = "Missing or invalid input", body = ErrorResponse),
        (status = 404, description = "Discord user could not be resolved", body = ErrorResponse),
        (status = 409, description = "User already has an active survey", body = ErrorResponse),
        (status = 503, description = "Discord bot not connected", body = ErrorResponse)
    )
)]
pub async fn start_survey_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<StartSurveyRequest>,
) -> Result<Json<StartSurveyResponse>, HandlerError> {
    let owner_id = require_field(req.owner_id, "ownerId")?;
    let api_key = match req.api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => Some(known_api_key(&app_state, key.trim().to_string()).await?),
        None => None,
    };

    let questions: Vec<Question> = match (req.questions, &api_key) {
        (Some(inline), _) if !inline.is_empty() => {
            inline.into_iter().map(QuestionInput::into_question).collect()
        }
        (_, Some(key)) => app_state
            .repository
            .get_questions(key)
            .await
            .map_err(|e| ErrorResponse::from_port_error(&e, "Failed to load questions"))?,
        _ => {
            return Err(ErrorResponse::reply(
                StatusCode::BAD_REQUEST,
                "Missing required fields",
                "Provide questions or an apiKey with saved questions",
            ))
        }
    };
    check_questions(&questions).map_err(|e| survey_error(&e))?;

    if !app_state.gateway.status().connected {
        return Err(ErrorResponse::reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service unavailable",
            "Discord bot is not connected",
        ));
    }

    let total_questions = questions.len();
    let first_prompt = app_state
        .engine
        .start_survey(&owner_id, questions, api_key)
        .map_err(|e| {
            warn!("Refused to start survey for {}: {}", owner_id, e);
            survey_error(&e)
        })?
        .to_string();

    if let Err(e) = app_state
        .gateway
        .send_direct_message(&owner_id, &first_prompt)
        .await
    {
        error!("Failed to send first question to {}: {:?}", owner_id, e);
        app_state.engine.cancel(&owner_id);
        return Err(ErrorResponse::from_port_error(&e, "Failed to start survey"));
    }

    info!("Started a {}-question survey for {}", total_questions, owner_id);
    Ok(Json(StartSurveyResponse {
        success: true,
        owner_id,
        first_prompt,
        total_questions,
    }))
}

/// Show how far a user has got through their active survey.
#[utoipa::path(
    get,
    path = "/api/surveys/{owner_id}",
    params(("owner_id" = String, Path, description = "Discord user id.")),
    responses(
        (status = 200, description = "Survey progress", body = SurveyProgressResponse),
        (status = 404, description = "No active survey", body = ErrorResponse)
    )
)]
pub async fn survey_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<SurveyProgressResponse>, HandlerError> {
    let session = app_state.engine.store().get(&owner_id).ok_or_else(|| {
        ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            "No active survey",
            format!("User {} has no active survey", owner_id),
        )
    })?;
    Ok(Json(SurveyProgressResponse {
        owner_id,
        answered: session.cursor(),
        total: session.questions().len(),
        current_question: session.current_question().map(|q| q.text.clone()),
        started_at: session.started_at(),
        last_activity_at: session.last_activity_at(),
    }))
}

/// Abandon a user's active survey.
#[utoipa::path(
    delete,
    path = "/api/surveys/{owner_id}",
    params(("owner_id" = String, Path, description = "Discord user id.")),
    responses(
        (status = 200, description = "Survey cancelled", body = SuccessResponse),
        (status = 404, description = "No active survey", body = ErrorResponse)
    )
)]
pub async fn cancel_survey_handler(
    State(app_state): State<Arc<AppState>>,
    Path(owner_id): Path<String>,
) -> Result<Json<SuccessResponse>, HandlerError> {
    match app_state.engine.cancel(&owner_id) {
        Some(session) => {
            info!(
                "Cancelled survey for {} after {} answers",
                owner_id,
                session.answers().len()
            );
            Ok(Json(SuccessResponse {
                success: true,
                message: Some(format!("Survey for {} cancelled", owner_id)),
            }))
        }
        None => Err(ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            "No active survey",
            format!("User {} has no active survey", owner_id),
        )),
    }
}

/// List surveys completed under the caller's API key.
#[utoipa::path(
    get,
    path = "/api/completed-surveys",
    responses(
        (status = 200, description = "Completed surveys, oldest first", body = CompletedSurveysResponse),
        (status = 401, description = "Missing or unknown API key")
    ),
    params(("Authorization" = String, Header, description = "`Bearer <api key>`"))
)]
pub async fn completed_surveys_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthenticatedKey(api_key)): Extension<AuthenticatedKey>,
) -> Result<Json<CompletedSurveysResponse>, HandlerError> {
    let surveys = app_state
        .repository
        .list_completed_surveys(&api_key)
        .await
        .map_err(|e| {
            error!("Failed to list completed surveys: {:?}", e);
            ErrorResponse::from_port_error(&e, "Failed to list completed surveys")
        })?;
    Ok(Json(CompletedSurveysResponse {
        success: true,
        data: surveys.into_iter().map(CompletedSurveyView::from).collect(),
    }))
}

//=========================================================================================
// Health
//=========================================================================================

/// Report gateway connectivity and engine load.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service status", body = HealthResponse))
)]
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = app_state.gateway.status();
    Json(HealthResponse {
        status: "ok".to_string(),
        bot_connected: status.connected,
        uptime_secs: app_state.started_at.elapsed().as_secs(),
        bot_tag: status.bot_tag,
        bot_id: status.bot_id,
        relay_channel: status.relay_channel.map(|c| RelayChannelView {
            id: c.id,
            name: c.name,
        }),
        active_sessions: app_state.engine.active_sessions(),
    })
}
