use std::sync::Arc;

use audio_eval_worker::{
    app_state::AppState,
    config::AppConfig,
    db::{self, queries::PgRecordStore},
    models::filter::Filter,
    routes,
};
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");
    let settings = config
        .worker_settings()
        .expect("Invalid worker configuration");

    tracing::info!("Initializing evaluation status API");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let eligibility = Filter::eligible(
        &settings.version,
        &settings.environment,
        settings.assessment_type,
        settings.max_retries,
    );
    let records = Arc::new(PgRecordStore::new(db_pool.clone()));
    let state = AppState::new(db_pool, records, eligibility);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/submissions/{id}",
            get(routes::submissions::get_submission_status),
        )
        .with_state(state)
        .route(
            "/metrics",
            get(routes::metrics::render).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Status API listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
