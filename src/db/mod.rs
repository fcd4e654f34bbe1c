use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::models::evaluation::{EvaluationResult, RecordRef, StoredResult};
use crate::models::filter::Filter;
use crate::models::submission::{Submission, SubmissionStatus};

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

pub mod queries;
pub mod result_queries;

/// One page of a filtered submission read.
#[derive(Debug, Clone, Default)]
pub struct SubmissionPage {
    pub items: Vec<Submission>,
    /// Offset of the next page, `None` on the last page.
    pub next_offset: Option<i64>,
}

/// External record store holding applicant submissions. It is the single
/// source of truth for status and retry counts.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read one page of submissions matching `filter`. Never fails on an
    /// empty match; returns an empty page instead.
    async fn query(&self, filter: &Filter, offset: i64, limit: i64) -> Result<SubmissionPage, StoreError>;

    async fn update_status(&self, id: &str, status: &SubmissionStatus) -> Result<(), StoreError>;

    /// Persist `current + 1` as the retry count and return it.
    async fn increment_retry(&self, id: &str, current: i32) -> Result<i32, StoreError>;

    async fn find(&self, id: &str) -> Result<Option<Submission>, StoreError>;
}

/// Store receiving evaluation results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn create(&self, result: &EvaluationResult) -> Result<RecordRef, StoreError>;

    /// Read a created result back together with its shareable link.
    async fn find(&self, id: &str) -> Result<Option<StoredResult>, StoreError>;
}

/// Lookup of reference scripts, quotes and photo descriptions.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn get(&self, reference_key: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Malformed row {id}: {reason}")]
    MalformedRow { id: String, reason: String },

    #[error("Record {0} not found")]
    NotFound(String),
}
