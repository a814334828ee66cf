//! Repair Tally Backend
//!
//! REST backend for equipment repair reports and per-camp fault tallies, with
//! grouped statistics, pivot tables and CSV/XLSX export over SQLite.

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod equipment;
mod errors;
mod models;
mod stats;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::SessionStore;
use cache::ReportCache;
use config::Config;
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub sessions: SessionStore,
    pub report_cache: ReportCache,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Repair Tally Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_password.is_none() {
        tracing::warn!("No admin password configured (REPAIR_ADMIN_PASSWORD). Admin login is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    let state = AppState {
        repo,
        sessions: SessionStore::new(config.session_idle_timeout),
        report_cache: ReportCache::new(config.report_cache_ttl),
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sessions = state.sessions.clone();

    // Routes that need a session
    let session_routes = Router::new()
        // Session
        .route("/session", get(api::current_session))
        .route("/session/logout", post(api::logout))
        .route("/session/scan", post(api::scan_equipment))
        .route("/equipment/resolve", get(api::resolve_equipment))
        // Options
        .route("/options", get(api::list_options))
        .route("/options/{category}", get(api::get_options))
        .route("/options/{category}", post(api::add_option))
        .route("/options/{category}/{value}", delete(api::remove_option))
        // Reports
        .route("/reports", get(api::list_reports))
        .route("/reports", post(api::create_report))
        .route("/reports/{id}", put(api::update_report))
        .route("/reports/{id}", delete(api::delete_report))
        // Counts
        .route("/counts", get(api::list_counts))
        .route("/counts", post(api::save_counts))
        // Statistics
        .route("/stats/group", get(api::group_stats))
        .route("/stats/pivot", get(api::pivot_stats))
        .route("/stats/reports", get(api::report_stats))
        // Exports
        .route("/export/counts", get(api::export_counts))
        .route("/export/group", get(api::export_group))
        .route("/export/pivot", get(api::export_pivot))
        .route("/export/reports", get(api::export_reports))
        .route("/export/workbook", get(api::export_workbook_file))
        // Apply session middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::session_auth_layer(sessions.clone(), req, next)
        }));

    // Login is the only API route reachable without a session
    let api_routes = session_routes.route("/session/login", post(api::login));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
