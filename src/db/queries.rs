use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::db::{RecordStore, StoreError, SubmissionPage};
use crate::models::filter::Filter;
use crate::models::submission::{AssessmentType, Submission, SubmissionStatus};

const SUBMISSION_COLUMNS: &str = "id, name, user_id, email, audio_url, assessment_type, reference_key, \
     given_transcription, status, no_of_retries, version, environment";

/// PostgreSQL-backed record store over the `submissions` table.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn submission_from_row(row: &PgRow) -> Result<Submission, StoreError> {
    let id: String = row.try_get("id")?;
    let assessment_type: String = row.try_get("assessment_type")?;
    let assessment_type = assessment_type
        .parse::<AssessmentType>()
        .map_err(|_| StoreError::MalformedRow {
            id: id.clone(),
            reason: format!("unknown assessment type {:?}", assessment_type),
        })?;
    let status: String = row.try_get("status")?;

    Ok(Submission {
        name: row.try_get("name")?,
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        audio_url: row.try_get("audio_url")?,
        assessment_type,
        reference_key: row.try_get("reference_key")?,
        given_transcription: row.try_get("given_transcription")?,
        status: SubmissionStatus::from_store_value(&status),
        no_of_retries: row.try_get("no_of_retries")?,
        version: row.try_get("version")?,
        environment: row.try_get("environment")?,
        id,
    })
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn query(&self, filter: &Filter, offset: i64, limit: i64) -> Result<SubmissionPage, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM submissions WHERE ", SUBMISSION_COLUMNS));
        filter.push_sql(&mut qb);
        qb.push(" ORDER BY created_at ASC, id ASC LIMIT ");
        // One extra row tells whether another page exists.
        qb.push_bind(limit + 1);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let has_more = rows.len() as i64 > limit;

        let items = rows
            .iter()
            .take(limit as usize)
            .map(submission_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SubmissionPage {
            next_offset: has_more.then_some(offset + limit),
            items,
        })
    }

    async fn update_status(&self, id: &str, status: &SubmissionStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET status = $1,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(status.as_store_value())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn increment_retry(&self, id: &str, current: i32) -> Result<i32, StoreError> {
        let row = sqlx::query(
            r#"
            UPDATE submissions
            SET no_of_retries = $1,
                updated_at = NOW()
            WHERE id = $2
            RETURNING no_of_retries
            "#,
        )
        .bind(current + 1)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(r.try_get("no_of_retries")?),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn find(&self, id: &str) -> Result<Option<Submission>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM submissions WHERE id = $1", SUBMISSION_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(submission_from_row).transpose()
    }
}
