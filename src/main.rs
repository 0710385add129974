//! tailtalk server entry point.
//!
//! Loads the local state, connects the remote mirror and starts the Axum
//! HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tailtalk::api;
use tailtalk::app_state::AppState;
use tailtalk::config::AppConfig;
use tailtalk::domain::EventBus;
use tailtalk::intake::GeminiClient;
use tailtalk::persistence::{FileStore, PostgresRemote};
use tailtalk::service::{DogService, SystemClock, spawn_remote_listener, spawn_ticker};
use tailtalk::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid LISTEN_ADDR")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(addr = %config.listen_addr, "starting tailtalk");

    let event_bus = EventBus::new(config.event_bus_capacity);
    let local = Arc::new(FileStore::new(&config.local_store_path));
    tracing::info!(path = %local.path().display(), "local store");
    let mut service = DogService::new(event_bus, local, Arc::new(SystemClock))
        .with_tuning(config.vitals_tuning())
        .with_remote_timeout(config.remote_timeout());

    if config.remote_sync_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connecting to the remote mirror")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running migrations")?;
        let remote = PostgresRemote::new(pool);
        service = service
            .with_remote(Arc::new(remote.clone()))
            .with_registry(Arc::new(remote));
        tracing::info!("remote mirror connected");
    } else {
        tracing::info!("remote sync disabled, running local-only");
    }

    if let Some(key) = &config.gemini_api_key {
        service = service.with_intake(Arc::new(
            GeminiClient::new(key, &config.gemini_text_model, &config.gemini_image_model)
                .with_portrait_model(&config.gemini_portrait_model),
        ));
    } else {
        tracing::info!("GEMINI_API_KEY not set, voice, scan and avatar intake disabled");
    }

    let service = Arc::new(service);
    if service.load().await.context("loading local state")?.is_none() {
        tracing::info!("no profile yet, waiting for onboarding");
    }
    if service.has_remote()
        && let Err(e) = service.refresh().await
    {
        tracing::warn!(error = %e, "initial refresh failed, serving local log");
    }

    let _ticker = spawn_ticker(Arc::clone(&service), config.recompute_interval());
    let _listener = spawn_remote_listener(Arc::clone(&service)).await;

    let app_state = AppState::new(service);

    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
