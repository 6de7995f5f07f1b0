//! services/api/src/web/relay.rs
//!
//! The web-form chat relay. A browser posts a message, the bot forwards it to
//! the relay channel, and the handler answers with whatever is said next in
//! that channel (by a person or another bot), or a timeout notice.

use crate::web::{
    protocol::{ChatRequest, ChatResponse, ErrorResponse},
    state::AppState,
};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

pub const MAX_MESSAGE_LEN: usize = 2000;
pub const MAX_USERNAME_LEN: usize = 32;

/// A message observed in the relay channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub author: String,
    pub content: String,
    pub is_bot: bool,
}

/// Fan-out of relay-channel traffic to the requests waiting on it.
#[derive(Clone)]
pub struct RelayHub {
    sender: broadcast::Sender<RelayMessage>,
}

impl RelayHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes a message to every waiting request. Dropped when nobody waits.
    pub fn publish(&self, message: RelayMessage) {
        let _ = self.sender.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RelayMessage> {
        self.sender.subscribe()
    }

    pub fn waiting(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new(64)
    }
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

/// Relay a web-form message into the Discord relay channel.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Reply (or timeout notice) from the relay channel", body = ChatResponse),
        (status = 400, description = "Missing or oversized fields", body = ErrorResponse),
        (status = 404, description = "Relay channel not found", body = ErrorResponse),
        (status = 503, description = "Discord bot not connected", body = ErrorResponse)
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, HandlerError> {
    let message = req.message.unwrap_or_default();
    let username = req.username.unwrap_or_default();

    if message.trim().is_empty() || username.trim().is_empty() {
        return Err(ErrorResponse::reply(
            StatusCode::BAD_REQUEST,
            "Missing required fields",
            "Message and username are required",
        ));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(ErrorResponse::reply(
            StatusCode::BAD_REQUEST,
            "Message too long",
            format!("Message must be at most {} characters", MAX_MESSAGE_LEN),
        ));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ErrorResponse::reply(
            StatusCode::BAD_REQUEST,
            "Username too long",
            format!("Username must be at most {} characters", MAX_USERNAME_LEN),
        ));
    }

    let status = app_state.gateway.status();
    if !status.connected {
        return Err(ErrorResponse::reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service unavailable",
            "Discord bot is not connected",
        ));
    }
    if status.relay_channel.is_none() {
        return Err(ErrorResponse::reply(
            StatusCode::NOT_FOUND,
            "Channel not found",
            format!(
                "The {} channel does not exist",
                app_state.config.relay_channel_name
            ),
        ));
    }

    // Subscribe before sending so a fast reply cannot be missed.
    let mut replies = app_state.relay.subscribe();
    let formatted = format!("[{}]: {}", username, message);
    if let Err(e) = app_state.gateway.send_relay_message(&formatted).await {
        error!("Failed to relay message from {}: {:?}", username, e);
        return Err(ErrorResponse::from_port_error(&e, "Failed to relay message"));
    }
    info!("Relayed message from {} to the relay channel", username);

    let timeout = app_state.config.relay_timeout;
    let reply = tokio::time::timeout(timeout, async {
        loop {
            match replies.recv().await {
                Ok(reply) => return Some(reply),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Relay listener lagged, skipped {} messages", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .await;

    let response = match reply {
        Ok(Some(reply)) => ChatResponse {
            response: reply.content,
            author: Some(reply.author),
            is_bot: Some(reply.is_bot),
        },
        Ok(None) | Err(_) => {
            info!("No relay reply for {} within {:?}", username, timeout);
            ChatResponse {
                response: format!(
                    "No response received within {} seconds",
                    timeout.as_secs()
                ),
                author: None,
                is_bot: None,
            }
        }
    };
    Ok(Json(response))
}
