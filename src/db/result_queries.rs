use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::db::{ReferenceStore, ResultStore, StoreError};
use crate::models::evaluation::{EvaluationResult, RecordRef, StoredResult};

/// PostgreSQL-backed result store over `evaluation_results`.
#[derive(Clone)]
pub struct PgResultStore {
    pool: PgPool,
    share_base_url: String,
}

impl PgResultStore {
    /// `share_base_url` prefixes the record id to form the reviewer link.
    pub fn new(pool: PgPool, share_base_url: &str) -> Self {
        Self {
            pool,
            share_base_url: share_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn share_url(&self, id: &str) -> String {
        format!("{}/{}", self.share_base_url, id)
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn create(&self, result: &EvaluationResult) -> Result<RecordRef, StoreError> {
        let id = Uuid::new_v4();
        let payload = serde_json::to_value(result)?;

        sqlx::query(
            r#"
            INSERT INTO evaluation_results
                (id, parent_record_id, assessment_type, composite_score, passed, version, environment, result)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(&result.parent_record_id)
        .bind(result.assessment_type.to_string())
        .bind(result.composite_score as i32)
        .bind(result.passed)
        .bind(&result.version)
        .bind(&result.environment)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(RecordRef { id: id.to_string() })
    }

    async fn find(&self, id: &str) -> Result<Option<StoredResult>, StoreError> {
        let uuid = Uuid::parse_str(id).map_err(|e| StoreError::MalformedRow {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        let row = sqlx::query("SELECT id, result, created_at FROM evaluation_results WHERE id = $1")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let stored_id: Uuid = r.try_get("id")?;
                let payload: serde_json::Value = r.try_get("result")?;
                let stored_id = stored_id.to_string();
                Ok(Some(StoredResult {
                    share_url: self.share_url(&stored_id),
                    id: stored_id,
                    created_at: r.try_get("created_at")?,
                    result: serde_json::from_value(payload)?,
                }))
            }
            None => Ok(None),
        }
    }
}

/// PostgreSQL-backed reference lookup over `reference_texts`.
#[derive(Clone)]
pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn get(&self, reference_key: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT content FROM reference_texts WHERE reference_key = $1")
            .bind(reference_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(r) => Some(r.try_get("content")?),
            None => None,
        })
    }
}
