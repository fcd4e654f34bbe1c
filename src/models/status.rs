use serde::Serialize;

use crate::models::submission::{AssessmentType, Submission};

/// Response for querying a submission's processing state.
#[derive(Debug, Serialize)]
pub struct SubmissionStatusResponse {
    pub id: String,
    pub assessment_type: AssessmentType,
    /// Raw status as stored; empty while unprocessed.
    pub status: String,
    pub no_of_retries: i32,
    /// Whether the next source sync of this worker would pick it up.
    pub eligible: bool,
}

impl SubmissionStatusResponse {
    pub fn new(submission: &Submission, eligible: bool) -> Self {
        Self {
            id: submission.id.clone(),
            assessment_type: submission.assessment_type,
            status: submission.status.as_store_value(),
            no_of_retries: submission.no_of_retries,
            eligible,
        }
    }
}
