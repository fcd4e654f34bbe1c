use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::models::submission::AssessmentType;
use crate::services::scoring::{ScoringError, WeightSet};
use crate::services::transcriber::TranscribeOptions;

pub mod profile;

pub use profile::{EvaluationProfile, ReferenceSource, ScriptReadingVariant};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Status API bind address (e.g., "0.0.0.0:3000"). Unused by the worker.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Prometheus listener of the worker process
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Version tag this worker is responsible for
    pub version: String,

    /// Environment tag this worker is responsible for
    pub environment: String,

    /// "Script Reading", "Quote Translation" or "Photo Interpretation"
    pub assessment_type: String,

    /// "standard" or "enhanced"
    #[serde(default = "default_variant")]
    pub script_reading_variant: String,

    #[serde(default = "default_max_retries")]
    pub max_retries: i32,

    /// Sleep after every refill of the task queue
    #[serde(default = "default_sync_backoff_secs")]
    pub sync_backoff_secs: u64,

    #[serde(default = "default_sync_page_size")]
    pub sync_page_size: i64,

    /// Local directory for downloaded recordings
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// Overrides the minimum recording duration of the profile
    pub min_duration_secs: Option<f64>,

    /// "a" or "b"; overrides the weight set of the profile
    pub weight_set: Option<String>,

    /// "retry" or "log_only"
    #[serde(default = "default_upload_failure_policy")]
    pub upload_failure_policy: String,

    /// R2 bucket name
    pub r2_bucket: String,

    /// R2 endpoint URL
    pub r2_endpoint: String,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: String,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: String,

    /// OpenAI-compatible base URL of the speech transcriber
    #[serde(default = "default_provider_url")]
    pub transcriber_api_url: String,

    pub transcriber_api_key: String,

    #[serde(default = "default_transcriber_model")]
    pub transcriber_model: String,

    #[serde(default = "default_transcriber_language")]
    pub transcriber_language: String,

    /// OpenAI-compatible base URL of the grading model
    #[serde(default = "default_provider_url")]
    pub grader_api_url: String,

    pub grader_api_key: String,

    #[serde(default = "default_grader_model")]
    pub grader_model: String,

    /// Token for the audio quality classifiers
    pub classifier_api_token: String,

    pub pronunciation_model_url: String,

    pub fluency_model_url: String,

    /// Webhook receiving reviewer notification cards
    pub notify_webhook_url: String,

    pub notify_channel_id: String,

    /// Prefix of the shareable link of a stored result
    pub result_base_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9100".to_string()
}

fn default_variant() -> String {
    "standard".to_string()
}

fn default_max_retries() -> i32 {
    3
}

fn default_sync_backoff_secs() -> u64 {
    3
}

fn default_sync_page_size() -> i64 {
    100
}

fn default_scratch_dir() -> String {
    "storage".to_string()
}

fn default_upload_failure_policy() -> String {
    "retry".to_string()
}

fn default_provider_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_transcriber_model() -> String {
    "whisper-large-v3".to_string()
}

fn default_transcriber_language() -> String {
    "en".to_string()
}

fn default_grader_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Validate the raw environment values and derive the typed worker
    /// settings.
    pub fn worker_settings(&self) -> Result<WorkerSettings, ConfigError> {
        let assessment_type = self
            .assessment_type
            .trim()
            .parse::<AssessmentType>()
            .map_err(|_| ConfigError::UnknownAssessmentType(self.assessment_type.clone()))?;

        let variant = match self.script_reading_variant.trim().to_ascii_lowercase().as_str() {
            "standard" => ScriptReadingVariant::Standard,
            "enhanced" => ScriptReadingVariant::Enhanced,
            other => return Err(ConfigError::UnknownVariant(other.to_string())),
        };

        let upload_failure_policy = match self.upload_failure_policy.trim().to_ascii_lowercase().as_str() {
            "retry" => UploadFailurePolicy::Retry,
            "log_only" => UploadFailurePolicy::LogOnly,
            other => return Err(ConfigError::UnknownUploadPolicy(other.to_string())),
        };

        if self.max_retries < 0 {
            return Err(ConfigError::Invalid(format!("max_retries must be >= 0, got {}", self.max_retries)));
        }
        if self.sync_page_size <= 0 {
            return Err(ConfigError::Invalid(format!(
                "sync_page_size must be positive, got {}",
                self.sync_page_size
            )));
        }
        if self.version.trim().is_empty() || self.environment.trim().is_empty() {
            return Err(ConfigError::Invalid("version and environment must be set".to_string()));
        }

        let transcribe = TranscribeOptions {
            model: self.transcriber_model.clone(),
            language: self.transcriber_language.clone(),
        };

        let mut profile = EvaluationProfile::for_assessment(assessment_type, variant, transcribe);
        if let Some(secs) = self.min_duration_secs {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ConfigError::Invalid(format!("min_duration_secs must be >= 0, got {}", secs)));
            }
            profile.min_duration_secs = secs;
        }
        if let Some(name) = &self.weight_set {
            profile.weights = WeightSet::by_name(name)?;
        }

        Ok(WorkerSettings {
            version: self.version.trim().to_string(),
            environment: self.environment.trim().to_uppercase(),
            assessment_type,
            max_retries: self.max_retries,
            sync_backoff: Duration::from_secs(self.sync_backoff_secs),
            sync_page_size: self.sync_page_size,
            scratch_dir: PathBuf::from(&self.scratch_dir),
            upload_failure_policy,
            notify_channel_id: self.notify_channel_id.clone(),
            profile,
        })
    }
}

/// What the status tracker does when archiving a recording fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadFailurePolicy {
    /// Count the attempt against the retry ceiling.
    Retry,
    /// Only log; the submission keeps its status and retry count.
    LogOnly,
}

/// Validated, typed settings of one worker instance.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub version: String,
    pub environment: String,
    pub assessment_type: AssessmentType,
    pub max_retries: i32,
    pub sync_backoff: Duration,
    pub sync_page_size: i64,
    pub scratch_dir: PathBuf,
    pub upload_failure_policy: UploadFailurePolicy,
    pub notify_channel_id: String,
    pub profile: EvaluationProfile,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Unknown assessment type: {0:?}")]
    UnknownAssessmentType(String),

    #[error("Unknown script reading variant: {0:?}")]
    UnknownVariant(String),

    #[error("Unknown upload failure policy: {0:?}")]
    UnknownUploadPolicy(String),

    #[error(transparent)]
    Weights(#[from] ScoringError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
