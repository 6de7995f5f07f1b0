//! services/api/src/web/sweeper.rs
//!
//! The background task that drops abandoned surveys. Only spawned when an idle
//! timeout is configured; otherwise sessions live until completed or cancelled.

use std::time::Duration;
use survey_core::engine::SurveyEngine;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Periodically expires sessions idle for longer than `max_idle`.
///
/// Runs until `cancellation_token` is cancelled.
pub async fn idle_session_sweeper(
    engine: SurveyEngine,
    max_idle: Duration,
    interval: Duration,
    cancellation_token: CancellationToken,
) {
    // Out-of-range timeouts effectively disable expiry.
    let max_idle =
        chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::days(36_500));
    info!("Idle-session sweeper started.");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Idle-session sweeper cancelled.");
                return;
            }
            _ = ticker.tick() => {
                let expired = engine.expire_idle(max_idle);
                if !expired.is_empty() {
                    info!("Expired {} idle surveys: {:?}", expired.len(), expired);
                }
            }
        }
    }
}
