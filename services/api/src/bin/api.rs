//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, DiscordGateway, DiscordHandler, InMemorySurveyRepository},
    config::Config,
    error::ApiError,
    web::{self, rest::ApiDoc, state::AppState, sweeper::idle_session_sweeper, RelayHub},
};
use serenity::{http::Http, Client};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Instant;
use survey_core::{engine::SurveyEngine, ports::SurveyRepository, store::InMemorySessionStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use axum::Router;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "{},serenity=warn",
            config.log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Choose the Survey Repository ---
    let repository: Arc<dyn SurveyRepository> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL not set; API keys and results will be kept in memory only.");
            Arc::new(InMemorySurveyRepository::new())
        }
    };

    // --- 3. Initialize the Discord Gateway ---
    let http = Arc::new(Http::new(&config.discord_token));
    let gateway = Arc::new(DiscordGateway::new(
        http,
        config.relay_channel_name.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        engine: SurveyEngine::new(Arc::new(InMemorySessionStore::new())),
        repository,
        gateway: gateway.clone(),
        relay: RelayHub::default(),
        started_at: Instant::now(),
    });

    // --- 5. Start the Discord Client ---
    let mut client = Client::builder(&config.discord_token, DiscordHandler::intents())
        .event_handler(DiscordHandler::new(gateway, app_state.clone()))
        .await?;
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        info!("Connecting to Discord...");
        if let Err(e) = client.start().await {
            error!("Discord client stopped: {}", e);
        }
    });

    // --- 6. Start Background Tasks ---
    let shutdown = CancellationToken::new();
    match config.session_idle_timeout {
        Some(max_idle) => {
            tokio::spawn(idle_session_sweeper(
                app_state.engine.clone(),
                max_idle,
                config.session_sweep_interval,
                shutdown.clone(),
            ));
        }
        None => info!("Idle-session expiry disabled; abandoned surveys are kept until cancelled."),
    }

    // --- 7. Create the Web Router ---
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 8. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let signal_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    shard_manager.shutdown_all().await;
    info!("Server stopped.");
    Ok(())
}
