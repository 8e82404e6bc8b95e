mod config;
mod db;
mod fetcher;
mod routes;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::fetcher::{start_background_refresh, Fetcher};
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("feeds.toml")?;
    let descriptors = config.descriptors();
    info!(
        "Loaded {} feeds across {} categories",
        descriptors.len(),
        config.categories.len()
    );

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:newsdesk.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let db = Arc::new(db);

    // Create fetcher
    let fetcher = Arc::new(Fetcher::new(
        db.clone(),
        descriptors,
        config.max_concurrency,
    ));

    // Start background refresh task
    let bg_fetcher = fetcher.clone();
    let refresh_interval = config.refresh_interval;
    tokio::spawn(async move {
        start_background_refresh(bg_fetcher, refresh_interval).await;
    });

    // Create app state
    let state = Arc::new(AppState {
        db: db.clone(),
        fetcher: fetcher.clone(),
        sort_tiebreak: config.sort_tiebreak,
        shuffle_results: config.shuffle_results,
    });

    // Build router
    let app = Router::new()
        .route("/news", get(routes::get_news))
        .route("/fetch-news", post(routes::fetch_news))
        .route("/fetch-status", get(routes::fetch_status))
        .route("/track-view", post(routes::track_view))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server starting on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
