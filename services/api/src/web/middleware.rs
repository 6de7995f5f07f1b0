//! services/api/src/web/middleware.rs
//!
//! API-key middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// The API key a request was authenticated with.
#[derive(Clone, Debug)]
pub struct AuthenticatedKey(pub String);

/// Middleware that validates an `Authorization: Bearer <api key>` header.
///
/// If valid, inserts the key into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the bearer token
    let api_key = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    // 2. Check the key against the repository
    let known = state.repository.api_key_exists(&api_key).await.map_err(|e| {
        error!("Failed to validate API key: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    if !known {
        return Err(StatusCode::UNAUTHORIZED);
    }

    // 3. Insert the key into request extensions
    req.extensions_mut().insert(AuthenticatedKey(api_key));

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
