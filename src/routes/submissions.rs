use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::status::SubmissionStatusResponse;

/// GET /api/v1/submissions/{id} — processing state of one submission.
pub async fn get_submission_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SubmissionStatusResponse>, StatusCode> {
    let submission = state
        .records
        .find(&id)
        .await
        .map_err(|e| {
            tracing::error!(submission_id = %id, error = %e, "Failed to load submission");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    let eligible = state.eligibility.matches(&submission);
    Ok(Json(SubmissionStatusResponse::new(&submission, eligible)))
}
