use std::sync::Arc;

use crate::db::{RecordStore, StoreError};
use crate::models::filter::Filter;
use crate::services::queue::TaskQueue;

/// Pulls eligible submissions from the record store into the task queue.
/// Read-only with respect to the store.
pub struct SourceSync {
    records: Arc<dyn RecordStore>,
    filter: Filter,
    page_size: i64,
}

impl SourceSync {
    pub fn new(records: Arc<dyn RecordStore>, filter: Filter, page_size: i64) -> Self {
        Self {
            records,
            filter,
            page_size: page_size.max(1),
        }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Read every page matching the filter and enqueue the rows in store
    /// order. Returns the number of tasks added.
    pub async fn sync(&self, queue: &mut TaskQueue) -> Result<usize, StoreError> {
        let mut offset = 0;
        let mut enqueued = 0;

        loop {
            let page = self.records.query(&self.filter, offset, self.page_size).await?;
            enqueued += queue.enqueue_many(page.items);

            match page.next_offset {
                Some(next) => offset = next,
                None => break,
            }
        }

        metrics::counter!("source_sync_enqueued").increment(enqueued as u64);
        if enqueued > 0 {
            tracing::info!(filter = %self.filter, enqueued, "Source sync enqueued submissions");
        } else {
            tracing::debug!(filter = %self.filter, "Source sync found nothing to enqueue");
        }

        Ok(enqueued)
    }
}
