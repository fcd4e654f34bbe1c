use std::sync::Arc;

use crate::config::UploadFailurePolicy;
use crate::db::{RecordStore, StoreError};
use crate::models::submission::{Submission, SubmissionStatus};
use crate::services::pipeline::PipelineFailure;

/// Record-store mutation chosen for a classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerAction {
    /// Terminal: write this status, never retried.
    SetStatus(SubmissionStatus),
    /// Transient: bump `no_of_retries` and leave the status alone.
    IncrementRetry,
    LogOnly,
}

/// The only component that writes status and retry counts back to the
/// record store.
pub struct StatusTracker {
    records: Arc<dyn RecordStore>,
    upload_failure_policy: UploadFailurePolicy,
}

impl StatusTracker {
    pub fn new(records: Arc<dyn RecordStore>, upload_failure_policy: UploadFailurePolicy) -> Self {
        Self {
            records,
            upload_failure_policy,
        }
    }

    pub fn action_for(&self, failure: &PipelineFailure) -> TrackerAction {
        match failure {
            PipelineFailure::InvalidSource(_) => TrackerAction::SetStatus(SubmissionStatus::InvalidAudioUrl),
            PipelineFailure::TooShort { threshold_secs, .. } => {
                TrackerAction::SetStatus(SubmissionStatus::AudioTooShort { secs: *threshold_secs })
            }
            PipelineFailure::UploadFailed(_) => match self.upload_failure_policy {
                UploadFailurePolicy::Retry => TrackerAction::IncrementRetry,
                UploadFailurePolicy::LogOnly => TrackerAction::LogOnly,
            },
            PipelineFailure::TranscriptionFailed(_)
            | PipelineFailure::GradingFailed(_)
            | PipelineFailure::GeneralError(_) => TrackerAction::IncrementRetry,
            PipelineFailure::MalformedSubmission(_) => TrackerAction::SetStatus(SubmissionStatus::ScriptError),
        }
    }

    /// Apply the action for `failure` and return what was done.
    pub async fn record_failure(
        &self,
        submission: &Submission,
        failure: &PipelineFailure,
    ) -> Result<TrackerAction, StoreError> {
        let action = self.action_for(failure);

        match &action {
            TrackerAction::SetStatus(status) => {
                self.records.update_status(&submission.id, status).await?;
                tracing::warn!(
                    submission_id = %submission.id,
                    kind = failure.kind(),
                    status = %status,
                    error = %failure,
                    "Submission marked with terminal status"
                );
            }
            TrackerAction::IncrementRetry => {
                let retries = self
                    .records
                    .increment_retry(&submission.id, submission.no_of_retries)
                    .await?;
                tracing::warn!(
                    submission_id = %submission.id,
                    kind = failure.kind(),
                    retry_count = retries,
                    error = %failure,
                    "Submission failed, retry count incremented"
                );
            }
            TrackerAction::LogOnly => {
                tracing::error!(
                    submission_id = %submission.id,
                    kind = failure.kind(),
                    error = %failure,
                    "Submission failed, status left unchanged"
                );
            }
        }

        Ok(action)
    }

    pub async fn mark_done(&self, submission: &Submission) -> Result<(), StoreError> {
        self.records.update_status(&submission.id, &SubmissionStatus::Done).await
    }
}
