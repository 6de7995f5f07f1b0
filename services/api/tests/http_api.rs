//! HTTP-level tests for the survey API, driven through the axum router with a
//! recording gateway in place of Discord.

use api_lib::{
    adapters::InMemorySurveyRepository,
    config::Config,
    web::{self, AppState, RelayHub, RelayMessage},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use survey_core::{
    engine::{OutboundAction, SurveyEngine},
    ports::{GatewayStatus, MessageGateway, PortError, PortResult, RelayChannel, SurveyRepository},
    store::InMemorySessionStore,
};
use tower::ServiceExt;

// ============================================================================
// TEST HELPERS
// ============================================================================

/// Records every outbound message instead of talking to Discord.
struct MockGateway {
    connected: bool,
    relay_channel: bool,
    unknown_users: HashSet<String>,
    fail_sends: bool,
    /// Replies posted to the relay hub whenever a relay message is sent.
    relay_echo: Option<(RelayHub, String)>,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockGateway {
    fn connected() -> Self {
        Self {
            connected: true,
            relay_channel: true,
            unknown_users: HashSet::new(),
            fail_sends: false,
            relay_echo: None,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageGateway for MockGateway {
    async fn send_direct_message(&self, owner_id: &str, text: &str) -> PortResult<()> {
        if !self.connected {
            return Err(PortError::Unavailable("offline".to_string()));
        }
        if self.unknown_users.contains(owner_id) {
            return Err(PortError::NotFound(format!("user {}", owner_id)));
        }
        if self.fail_sends {
            return Err(PortError::Unavailable("send failed".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((owner_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_relay_message(&self, text: &str) -> PortResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push(("#webform-bot".to_string(), text.to_string()));
        if let Some((hub, reply)) = &self.relay_echo {
            hub.publish(RelayMessage {
                author: "helper#0001".to_string(),
                content: reply.clone(),
                is_bot: true,
            });
        }
        Ok(())
    }

    fn status(&self) -> GatewayStatus {
        GatewayStatus {
            connected: self.connected,
            bot_tag: Some("SurveyBot#0001".to_string()),
            bot_id: Some("1".to_string()),
            relay_channel: self.relay_channel.then(|| RelayChannel {
                id: "99".to_string(),
                name: "webform-bot".to_string(),
            }),
        }
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    gateway: Arc<MockGateway>,
}

fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        log_level: tracing::Level::INFO,
        database_url: None,
        discord_token: "test-token".to_string(),
        relay_channel_name: "webform-bot".to_string(),
        relay_timeout: Duration::from_millis(200),
        session_idle_timeout: None,
        session_sweep_interval: Duration::from_secs(60),
    }
}

fn app_with(configure: impl FnOnce(&mut MockGateway, &RelayHub)) -> TestApp {
    let relay = RelayHub::default();
    let mut gateway = MockGateway::connected();
    configure(&mut gateway, &relay);
    let gateway = Arc::new(gateway);

    let state = Arc::new(AppState {
        config: Arc::new(test_config()),
        engine: SurveyEngine::new(Arc::new(InMemorySessionStore::new())),
        repository: Arc::new(InMemorySurveyRepository::new()),
        gateway: gateway.clone(),
        relay,
        started_at: Instant::now(),
    });
    TestApp {
        router: web::router(state.clone()),
        state,
        gateway,
    }
}

fn app() -> TestApp {
    app_with(|_, _| {})
}

async fn send(app: &TestApp, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_auth(app, method, uri, body, None).await
}

async fn send_with_auth(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(key) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", key));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn name_and_rating() -> Value {
    json!([
        { "text": "What is your name?", "format": "text" },
        { "text": "Rate 1-10", "format": "number" }
    ])
}

// ============================================================================
// API KEYS AND QUESTION SETS
// ============================================================================

#[tokio::test]
async fn question_sets_round_trip_through_an_api_key() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/generate-key", None).await;
    assert_eq!(status, StatusCode::OK);
    let key = body["apiKey"].as_str().unwrap().to_string();
    assert!(key.starts_with("sk_"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/save-questions",
        Some(json!({
            "apiKey": key,
            "questions": [
                { "text": "What's your email?", "format": "text" },
                { "text": "Pick a colour", "format": "multiple", "options": { "a": "Red", "b": "Blue" } }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&app, Method::GET, &format!("/api/get-questions?api_key={}", key), None).await;
    assert_eq!(status, StatusCode::OK);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    // Rules are fixed at authoring time and labels normalised.
    assert_eq!(questions[0]["validation"], "email");
    assert_eq!(questions[1]["options"]["A"], "Red");
}

#[tokio::test]
async fn question_sets_reject_bad_input() {
    let app = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/save-questions",
        Some(json!({ "apiKey": "sk_nope", "questions": name_and_rating() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::POST, "/api/generate-key", None).await;
    let key = body["apiKey"].as_str().unwrap();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/save-questions",
        Some(json!({ "apiKey": key, "questions": [{ "text": "Pick", "format": "multiple" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid questions");

    let (status, _) = send(&app, Method::GET, "/api/get-questions", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ============================================================================
// SURVEYS
// ============================================================================

#[tokio::test]
async fn starting_a_survey_sends_the_first_prompt() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "1001", "questions": name_and_rating() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firstPrompt"], "What is your name?");
    assert_eq!(body["totalQuestions"], 2);
    assert_eq!(
        app.gateway.sent(),
        vec![("1001".to_string(), "What is your name?".to_string())]
    );

    let (status, body) = send(&app, Method::GET, "/api/surveys/1001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answered"], 0);
    assert_eq!(body["total"], 2);
    assert_eq!(body["currentQuestion"], "What is your name?");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "1001", "questions": name_and_rating() })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Survey already active");
    assert_eq!(app.gateway.sent().len(), 1);
}

#[tokio::test]
async fn legacy_send_dm_path_uses_the_saved_question_set() {
    let app = app();
    let (_, body) = send(&app, Method::POST, "/api/generate-key", None).await;
    let key = body["apiKey"].as_str().unwrap().to_string();
    send(
        &app,
        Method::POST,
        "/api/save-questions",
        Some(json!({ "apiKey": key, "questions": [{ "text": "Happy?", "format": "yesno" }] })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/send-dm",
        Some(json!({ "userId": "2002", "api_key": key })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["firstPrompt"], "Happy? (yes/no)");
    assert_eq!(
        app.state.engine.store().get("2002").unwrap().api_key(),
        Some(key.as_str())
    );
}

#[tokio::test]
async fn start_validates_input() {
    let app = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "questions": name_and_rating() })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::POST, "/api/surveys/start", Some(json!({ "ownerId": "1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "1", "apiKey": "sk_unknown" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.state.engine.store().is_empty());
}

#[tokio::test]
async fn unknown_user_gives_404_and_leaves_no_session() {
    let app = app_with(|gateway, _| {
        gateway.unknown_users.insert("3003".to_string());
    });
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "3003", "questions": name_and_rating() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.state.engine.store().get("3003").is_none());
}

#[tokio::test]
async fn gateway_problems_give_503() {
    let offline = app_with(|gateway, _| gateway.connected = false);
    let (status, _) = send(
        &offline,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "4004", "questions": name_and_rating() })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(offline.state.engine.store().is_empty());

    let flaky = app_with(|gateway, _| gateway.fail_sends = true);
    let (status, _) = send(
        &flaky,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "4004", "questions": name_and_rating() })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(flaky.state.engine.store().get("4004").is_none());
}

#[tokio::test]
async fn cancelling_a_survey() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "5005", "questions": name_and_rating() })),
    )
    .await;

    let (status, _) = send(&app, Method::DELETE, "/api/surveys/5005", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::DELETE, "/api/surveys/5005", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/api/surveys/5005", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn completed_surveys_are_listed_per_api_key() {
    let app = app();
    let (_, body) = send(&app, Method::POST, "/api/generate-key", None).await;
    let key = body["apiKey"].as_str().unwrap().to_string();

    send(
        &app,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "6006", "apiKey": key, "questions": name_and_rating() })),
    )
    .await;

    // Play the DM side the way the Discord handler does.
    assert!(matches!(
        app.state.engine.advance("6006", "John"),
        Some(OutboundAction::SendNextPrompt(_))
    ));
    let Some(OutboundAction::SendCompletionSummary(completed)) = app.state.engine.advance("6006", "7") else {
        panic!("survey should be complete");
    };
    app.state.repository.save_completed_survey(&completed).await.unwrap();

    let (status, _) = send(&app, Method::GET, "/api/completed-surveys", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) =
        send_with_auth(&app, Method::GET, "/api/completed-surveys", None, Some("sk_nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        send_with_auth(&app, Method::GET, "/api/completed-surveys", None, Some(&key)).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["ownerId"], "6006");
    assert_eq!(data[0]["answers"][0]["question"], "What is your name?");
    assert_eq!(data[0]["answers"][0]["answer"], "John");
    assert_eq!(data[0]["answers"][1]["answer"], "7");
}

// ============================================================================
// CHAT RELAY AND HEALTH
// ============================================================================

#[tokio::test]
async fn chat_relays_and_returns_the_next_channel_message() {
    let app = app_with(|gateway, relay| {
        gateway.relay_echo = Some((relay.clone(), "Thanks, we'll be in touch".to_string()));
    });
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "Hello there", "username": "visitor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Thanks, we'll be in touch");
    assert_eq!(body["author"], "helper#0001");
    assert_eq!(body["isBot"], true);
    assert_eq!(
        app.gateway.sent(),
        vec![("#webform-bot".to_string(), "[visitor]: Hello there".to_string())]
    );
}

#[tokio::test]
async fn chat_times_out_without_a_reply() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "Anyone?", "username": "visitor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "No response received within 0 seconds");
    assert!(body["author"].is_null());
}

#[tokio::test]
async fn chat_validates_input_and_gateway_state() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/api/chat", Some(json!({ "message": "hi" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "x".repeat(2001), "username": "visitor" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message too long");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "hi", "username": "u".repeat(33) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let offline = app_with(|gateway, _| gateway.connected = false);
    let (status, _) = send(
        &offline,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "hi", "username": "visitor" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let no_channel = app_with(|gateway, _| gateway.relay_channel = false);
    let (status, _) = send(
        &no_channel,
        Method::POST,
        "/api/chat",
        Some(json!({ "message": "hi", "username": "visitor" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_gateway_and_sessions() {
    let app = app();
    send(
        &app,
        Method::POST,
        "/api/surveys/start",
        Some(json!({ "ownerId": "7007", "questions": name_and_rating() })),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["botConnected"], true);
    assert_eq!(body["botTag"], "SurveyBot#0001");
    assert_eq!(body["relayChannel"]["name"], "webform-bot");
    assert_eq!(body["activeSessions"], 1);
}
