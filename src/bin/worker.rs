use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use audio_eval_worker::{
    config::AppConfig,
    db::{
        self,
        queries::PgRecordStore,
        result_queries::{PgReferenceStore, PgResultStore},
    },
    models::filter::Filter,
    services::{
        classifier::InferenceApiClassifier,
        dispatcher::Dispatcher,
        grading::ChatGrader,
        notification::WebhookNotifier,
        pipeline::{Collaborators, EvaluationPipeline, PipelineSettings},
        storage::R2Client,
        sync::SourceSync,
        transcriber::WhisperApiClient,
    },
};
use metrics_exporter_prometheus::PrometheusBuilder;
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

    tracing::info!("Starting evaluation worker");

    let config = AppConfig::from_env().expect("Failed to load configuration");
    let settings = config
        .worker_settings()
        .expect("Invalid worker configuration");

    let metrics_addr: SocketAddr = config
        .metrics_addr
        .parse()
        .expect("METRICS_ADDR must be a socket address");
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .expect("Failed to install Prometheus exporter");

    metrics::describe_counter!("evaluation_jobs_completed", "Submissions evaluated successfully");
    metrics::describe_counter!("evaluation_jobs_failed", "Submissions that failed, by failure kind");
    metrics::describe_histogram!("evaluation_processing_seconds", "Time to run one submission through the pipeline");
    metrics::describe_gauge!("evaluation_queue_depth", "Tasks waiting in the in-memory queue");
    metrics::describe_counter!("source_sync_enqueued", "Submissions enqueued by source sync");

    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Initializing collaborators");
    let media = R2Client::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
    )
    .expect("Failed to initialize R2 client");

    let records = Arc::new(PgRecordStore::new(db_pool.clone()));
    let collaborators = Collaborators {
        records: records.clone(),
        results: Arc::new(PgResultStore::new(db_pool.clone(), &config.result_base_url)),
        references: Arc::new(PgReferenceStore::new(db_pool)),
        media: Arc::new(media),
        transcriber: Arc::new(WhisperApiClient::new(
            &config.transcriber_api_url,
            &config.transcriber_api_key,
        )),
        grader: Arc::new(ChatGrader::new(
            &config.grader_api_url,
            &config.grader_api_key,
            &config.grader_model,
        )),
        classifier: Arc::new(InferenceApiClassifier::new(
            &config.classifier_api_token,
            &config.pronunciation_model_url,
            &config.fluency_model_url,
        )),
        notifier: Arc::new(WebhookNotifier::new(&config.notify_webhook_url)),
    };

    let pipeline = EvaluationPipeline::new(
        settings.profile.clone(),
        collaborators,
        PipelineSettings {
            scratch_dir: settings.scratch_dir.clone(),
            notify_channel_id: settings.notify_channel_id.clone(),
            upload_failure_policy: settings.upload_failure_policy,
        },
    );
    let mut pipelines = HashMap::new();
    pipelines.insert(settings.assessment_type, pipeline);

    let filter = Filter::eligible(
        &settings.version,
        &settings.environment,
        settings.assessment_type,
        settings.max_retries,
    );
    let sync = SourceSync::new(records, filter, settings.sync_page_size);
    let mut dispatcher = Dispatcher::new(sync, pipelines, settings.sync_backoff);

    tracing::info!(
        version = %settings.version,
        environment = %settings.environment,
        assessment_type = %settings.assessment_type,
        min_duration_secs = settings.profile.min_duration_secs,
        weight_set = settings.profile.weights.name(),
        "Worker ready, starting dispatch loop"
    );

    dispatcher
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    tracing::info!("Worker stopped");
}
