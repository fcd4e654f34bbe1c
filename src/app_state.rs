use sqlx::PgPool;
use std::sync::Arc;

use crate::db::RecordStore;
use crate::models::filter::Filter;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub records: Arc<dyn RecordStore>,
    /// Eligibility predicate of the worker this API reports on.
    pub eligibility: Arc<Filter>,
}

impl AppState {
    pub fn new(db: PgPool, records: Arc<dyn RecordStore>, eligibility: Filter) -> Self {
        Self {
            db,
            records,
            eligibility: Arc::new(eligibility),
        }
    }
}
