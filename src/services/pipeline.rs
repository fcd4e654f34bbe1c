use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use garde::Validate;
use uuid::Uuid;

use crate::config::{EvaluationProfile, ReferenceSource, UploadFailurePolicy};
use crate::db::{RecordStore, ReferenceStore, ResultStore, StoreError};
use crate::models::evaluation::{AssessmentDetails, EvaluationResult, StoredResult};
use crate::models::submission::{Submission, Task};
use crate::services::audio::{self, AudioFeatures};
use crate::services::classifier::{AudioQualityClassifier, QualityAspect};
use crate::services::grading::{Grader, GradingError};
use crate::services::notification::{self, NotificationSink};
use crate::services::scoring::{self, SubScores};
use crate::services::storage::{MediaStore, StorageError};
use crate::services::text;
use crate::services::tracker::{StatusTracker, TrackerAction};
use crate::services::transcriber::{TranscriptionError, Transcriber};

/// Classified reason a submission could not be evaluated.
#[derive(Debug, thiserror::Error)]
pub enum PipelineFailure {
    #[error("Recording could not be fetched or decoded: {0}")]
    InvalidSource(String),

    #[error("Recording lasts {duration_secs:.3}s, below the {threshold_secs}s minimum")]
    TooShort { duration_secs: f64, threshold_secs: u32 },

    #[error("Archiving the recording failed: {0}")]
    UploadFailed(#[source] StorageError),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(#[source] TranscriptionError),

    #[error("Grading failed: {0}")]
    GradingFailed(#[source] GradingError),

    #[error("{0}")]
    GeneralError(String),

    #[error("Malformed submission: {0}")]
    MalformedSubmission(String),
}

impl PipelineFailure {
    /// Metric and log label.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineFailure::InvalidSource(_) => "invalid_source",
            PipelineFailure::TooShort { .. } => "too_short",
            PipelineFailure::UploadFailed(_) => "upload_failed",
            PipelineFailure::TranscriptionFailed(_) => "transcription_failed",
            PipelineFailure::GradingFailed(_) => "grading_failed",
            PipelineFailure::GeneralError(_) => "general_error",
            PipelineFailure::MalformedSubmission(_) => "malformed_submission",
        }
    }
}

impl From<StoreError> for PipelineFailure {
    fn from(e: StoreError) -> Self {
        PipelineFailure::GeneralError(e.to_string())
    }
}

/// Every external service a pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub records: Arc<dyn RecordStore>,
    pub results: Arc<dyn ResultStore>,
    pub references: Arc<dyn ReferenceStore>,
    pub media: Arc<dyn MediaStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub grader: Arc<dyn Grader>,
    pub classifier: Arc<dyn AudioQualityClassifier>,
    pub notifier: Arc<dyn NotificationSink>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub scratch_dir: PathBuf,
    pub notify_channel_id: String,
    pub upload_failure_policy: UploadFailurePolicy,
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed {
        result_id: String,
        composite_score: u32,
        passed: bool,
    },
    Failed {
        kind: &'static str,
        /// `None` when the record store rejected the write.
        action: Option<TrackerAction>,
    },
}

/// Local files of one task, removed on every exit path.
#[derive(Debug, Default)]
struct ScratchFiles {
    paths: Vec<PathBuf>,
}

impl ScratchFiles {
    fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
            }
        }
    }
}

/// File extension of the remote recording, `mp3` when it has none.
fn remote_extension(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "mp3".to_string())
}

/// Stage sequence shared by every assessment type. Per-type behaviour comes
/// from the profile.
pub struct EvaluationPipeline {
    profile: EvaluationProfile,
    collaborators: Collaborators,
    tracker: StatusTracker,
    settings: PipelineSettings,
}

impl EvaluationPipeline {
    pub fn new(profile: EvaluationProfile, collaborators: Collaborators, settings: PipelineSettings) -> Self {
        let tracker = StatusTracker::new(collaborators.records.clone(), settings.upload_failure_policy);
        Self {
            profile,
            collaborators,
            tracker,
            settings,
        }
    }

    /// Run one task to completion and write its outcome back to the record
    /// store. Never returns an error: every failure is classified and
    /// recorded here.
    pub async fn process(&self, task: Task) -> PipelineOutcome {
        let submission = task.submission;
        let started = Instant::now();

        tracing::info!(
            submission_id = %submission.id,
            assessment_type = %task.kind,
            retries = submission.no_of_retries,
            "Processing submission"
        );

        let outcome = match self.evaluate(&submission, started).await {
            Ok(stored) => match self.tracker.mark_done(&submission).await {
                Ok(()) => {
                    self.notify(&stored).await;
                    metrics::counter!("evaluation_jobs_completed").increment(1);
                    tracing::info!(
                        submission_id = %submission.id,
                        result_id = %stored.id,
                        composite_score = stored.result.composite_score,
                        passed = stored.result.passed,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Submission evaluated"
                    );
                    PipelineOutcome::Completed {
                        result_id: stored.id,
                        composite_score: stored.result.composite_score,
                        passed: stored.result.passed,
                    }
                }
                Err(e) => self.fail(&submission, PipelineFailure::from(e)).await,
            },
            Err(failure) => self.fail(&submission, failure).await,
        };

        metrics::histogram!("evaluation_processing_seconds").record(started.elapsed().as_secs_f64());
        outcome
    }

    async fn fail(&self, submission: &Submission, failure: PipelineFailure) -> PipelineOutcome {
        let kind = failure.kind();
        metrics::counter!("evaluation_jobs_failed", "kind" => kind).increment(1);

        let action = match self.tracker.record_failure(submission, &failure).await {
            Ok(action) => Some(action),
            Err(e) => {
                tracing::error!(
                    submission_id = %submission.id,
                    kind,
                    error = %e,
                    "Failed to record pipeline failure"
                );
                None
            }
        };

        PipelineOutcome::Failed { kind, action }
    }

    async fn notify(&self, stored: &StoredResult) {
        let content = notification::render_card(&stored.result, &stored.share_url);
        if let Err(e) = self
            .collaborators
            .notifier
            .send(&self.settings.notify_channel_id, &content)
            .await
        {
            tracing::warn!(result_id = %stored.id, error = %e, "Failed to send notification");
        }
    }

    /// Check the fields every later stage relies on before touching the
    /// network.
    fn check_submission(&self, submission: &Submission) -> Result<(), PipelineFailure> {
        submission
            .validate()
            .map_err(|e| PipelineFailure::MalformedSubmission(e.to_string()))?;

        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        match self.profile.reference_source {
            ReferenceSource::Store if !present(&submission.reference_key) => {
                Err(PipelineFailure::MalformedSubmission("missing reference_key".to_string()))
            }
            ReferenceSource::Inline if !present(&submission.given_transcription) => {
                Err(PipelineFailure::MalformedSubmission("missing given_transcription".to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn reference_text(&self, submission: &Submission) -> Result<String, PipelineFailure> {
        match self.profile.reference_source {
            ReferenceSource::Inline => Ok(submission.given_transcription.clone().unwrap_or_default()),
            ReferenceSource::Store => {
                let key = submission.reference_key.as_deref().unwrap_or_default();
                self.collaborators
                    .references
                    .get(key)
                    .await?
                    .ok_or_else(|| PipelineFailure::MalformedSubmission(format!("unknown reference_key {:?}", key)))
            }
        }
    }

    async fn evaluate(&self, submission: &Submission, started: Instant) -> Result<StoredResult, PipelineFailure> {
        self.check_submission(submission)?;

        let scratch_dir = self.settings.scratch_dir.join(submission.assessment_type.slug());
        tokio::fs::create_dir_all(&scratch_dir).await.map_err(|e| {
            PipelineFailure::GeneralError(format!("scratch directory {}: {}", scratch_dir.display(), e))
        })?;

        let mut scratch = ScratchFiles::default();
        let audio_path = scratch.track(scratch_dir.join(format!(
            "{}.{}.{}",
            submission.scratch_identity(),
            Uuid::new_v4().simple(),
            remote_extension(&submission.audio_url)
        )));

        // Fetch
        tracing::debug!(submission_id = %submission.id, url = %submission.audio_url, "Downloading recording");
        self.collaborators
            .media
            .download(&submission.audio_url, &audio_path)
            .await
            .map_err(|e| PipelineFailure::InvalidSource(e.to_string()))?;

        // Validate
        let decode_path = audio_path.clone();
        let features: AudioFeatures = tokio::task::spawn_blocking(move || audio::analyze_file(&decode_path))
            .await
            .map_err(|e| PipelineFailure::GeneralError(format!("audio analysis task failed: {}", e)))?
            .map_err(|e| PipelineFailure::InvalidSource(e.to_string()))?;

        let duration = features.speech_duration_secs;
        if !self.profile.accepts_duration(duration) {
            return Err(PipelineFailure::TooShort {
                duration_secs: duration,
                threshold_secs: self.profile.threshold_secs(),
            });
        }
        tracing::debug!(submission_id = %submission.id, duration_secs = duration, "Recording validated");

        // Archive
        let audio_token = self
            .collaborators
            .media
            .upload(&audio_path)
            .await
            .map_err(PipelineFailure::UploadFailed)?;

        // Transcribe
        let reference_text = self.reference_text(submission).await?;
        let transcription = self
            .collaborators
            .transcriber
            .transcribe(&audio_path, &self.profile.transcribe)
            .await
            .map_err(PipelineFailure::TranscriptionFailed)?;

        let normalized_transcript = text::normalize(&transcription);
        let normalized_reference = text::normalize(&reference_text);
        tracing::debug!(
            submission_id = %submission.id,
            words = text::word_count(&normalized_transcript),
            "Transcription complete"
        );

        // Score
        let similarity = scoring::similarity_score(&normalized_transcript, &normalized_reference);
        let wpm = scoring::words_per_minute(text::word_count(&normalized_transcript), duration);
        let speaking_rate = scoring::speaking_rate_category(wpm);
        let pacing = scoring::pacing_score(speaking_rate, scoring::pause_category(features.avg_pause_secs));
        let pitch_stability = scoring::pitch_stability_score(features.pitch_peak_ratio);
        let (correct_word_count, total_word_count) =
            text::word_correctness(&normalized_reference, &normalized_transcript);

        let classifier = &self.collaborators.classifier;
        let pronunciation = classifier
            .predict(QualityAspect::Pronunciation, &audio_path)
            .await
            .map_err(|e| PipelineFailure::GeneralError(format!("pronunciation classifier: {}", e)))?
            .score();
        let fluency = classifier
            .predict(QualityAspect::Fluency, &audio_path)
            .await
            .map_err(|e| PipelineFailure::GeneralError(format!("fluency classifier: {}", e)))?
            .score();

        let scores = SubScores {
            pronunciation,
            fluency,
            speaking_rate,
            similarity,
            pacing,
            pitch_stability,
        };

        // Grade
        let grading = self
            .collaborators
            .grader
            .evaluate(&self.profile.prompt, &normalized_transcript, &reference_text)
            .await
            .map_err(PipelineFailure::GradingFailed)?;
        let details = AssessmentDetails::from_criteria(
            submission.assessment_type,
            &grading.criteria,
            correct_word_count,
            total_word_count,
        )
        .map_err(|name| PipelineFailure::GradingFailed(GradingError::MissingCriterion(name)))?;

        // Aggregate
        let composite_score = scoring::composite_score(&scores, &self.profile.weights);
        let passed = scoring::passes(composite_score);

        let result = EvaluationResult {
            parent_record_id: submission.id.clone(),
            assessment_type: submission.assessment_type,
            name: submission.name.clone(),
            email: submission.email.clone(),
            reference_key: submission.reference_key.clone(),
            transcription,
            reference_text,
            audio: audio_token,
            evaluation: grading.evaluation,
            scores,
            composite_score,
            passed,
            words_per_minute: wpm,
            avg_pause_duration: features.avg_pause_secs,
            audio_duration_seconds: duration,
            correct_word_count,
            total_word_count,
            details,
            processing_duration: started.elapsed().as_secs_f64(),
            version: submission.version.clone(),
            environment: submission.environment.clone(),
        };

        // Persist
        let record = self.collaborators.results.create(&result).await?;
        let stored = self
            .collaborators
            .results
            .find(&record.id)
            .await?
            .ok_or_else(|| PipelineFailure::GeneralError(format!("result {} missing after create", record.id)))?;

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_extension() {
        assert_eq!(remote_extension("https://cdn.example.com/a/b/take1.WAV?sig=1"), "wav");
        assert_eq!(remote_extension("https://cdn.example.com/a/b/recording"), "mp3");
        assert_eq!(remote_extension("not a url"), "mp3");
        assert_eq!(remote_extension("https://cdn.example.com/x.tar.gz-bad!"), "mp3");
    }

    #[test]
    fn test_scratch_files_removed_on_drop() {
        let dir = std::env::temp_dir().join(format!("scratch-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        let kept = dir.join("a.mp3");
        std::fs::write(&kept, b"data").unwrap();

        {
            let mut scratch = ScratchFiles::default();
            scratch.track(kept.clone());
            scratch.track(dir.join("never-created.mp3"));
        }

        assert!(!kept.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(PipelineFailure::InvalidSource("x".into()).kind(), "invalid_source");
        assert_eq!(
            PipelineFailure::TooShort {
                duration_secs: 1.0,
                threshold_secs: 30
            }
            .kind(),
            "too_short"
        );
        assert_eq!(PipelineFailure::MalformedSubmission("x".into()).kind(), "malformed_submission");
    }
}
