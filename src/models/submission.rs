use std::fmt;

use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of recorded assessment an applicant submitted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[strum(serialize_all = "title_case", ascii_case_insensitive)]
pub enum AssessmentType {
    #[serde(rename = "Script Reading")]
    ScriptReading,
    #[serde(rename = "Quote Translation")]
    QuoteTranslation,
    #[serde(rename = "Photo Interpretation")]
    PhotoInterpretation,
}

impl AssessmentType {
    /// Directory name used for scratch files of this assessment.
    pub fn slug(&self) -> &'static str {
        match self {
            AssessmentType::ScriptReading => "script_reading",
            AssessmentType::QuoteTranslation => "quote_translation",
            AssessmentType::PhotoInterpretation => "photo_interpretation",
        }
    }
}

/// Processing status of a submission as stored in the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Empty string in the store: not processed yet.
    Unprocessed,
    Done,
    Failed,
    InvalidAudioUrl,
    /// `audio_less_than_<secs>_secs`
    AudioTooShort { secs: u32 },
    FileDeleted,
    ScriptError,
    /// Any value this worker does not produce itself.
    Other(String),
}

impl SubmissionStatus {
    /// Statuses that still allow another processing attempt.
    pub const RETRYABLE: [SubmissionStatus; 2] = [SubmissionStatus::Unprocessed, SubmissionStatus::Failed];

    pub fn as_store_value(&self) -> String {
        match self {
            SubmissionStatus::Unprocessed => String::new(),
            SubmissionStatus::Done => "done".to_string(),
            SubmissionStatus::Failed => "failed".to_string(),
            SubmissionStatus::InvalidAudioUrl => "invalid audio url".to_string(),
            SubmissionStatus::AudioTooShort { secs } => format!("audio_less_than_{}_secs", secs),
            SubmissionStatus::FileDeleted => "file deleted".to_string(),
            SubmissionStatus::ScriptError => "script error".to_string(),
            SubmissionStatus::Other(value) => value.clone(),
        }
    }

    pub fn from_store_value(value: &str) -> Self {
        match value.trim() {
            "" => SubmissionStatus::Unprocessed,
            "done" => SubmissionStatus::Done,
            "failed" => SubmissionStatus::Failed,
            "invalid audio url" => SubmissionStatus::InvalidAudioUrl,
            "file deleted" => SubmissionStatus::FileDeleted,
            "script error" => SubmissionStatus::ScriptError,
            other => other
                .strip_prefix("audio_less_than_")
                .and_then(|rest| rest.strip_suffix("_secs"))
                .and_then(|secs| secs.parse().ok())
                .map(|secs| SubmissionStatus::AudioTooShort { secs })
                .unwrap_or_else(|| SubmissionStatus::Other(other.to_string())),
        }
    }

    pub fn is_retryable(&self) -> bool {
        Self::RETRYABLE.contains(self)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_store_value())
    }
}

/// An applicant submission owned by the external record store.
#[derive(Debug, Clone, Validate)]
pub struct Submission {
    #[garde(length(min = 1))]
    pub id: String,

    #[garde(length(min = 1))]
    pub name: String,

    #[garde(skip)]
    pub user_id: Option<String>,

    #[garde(skip)]
    pub email: String,

    #[garde(length(min = 1, max = 2048))]
    pub audio_url: String,

    #[garde(skip)]
    pub assessment_type: AssessmentType,

    /// Identifies the script, quote or photo description to compare against.
    #[garde(skip)]
    pub reference_key: Option<String>,

    /// Reference text carried by the submission itself (enhanced reading).
    #[garde(skip)]
    pub given_transcription: Option<String>,

    #[garde(skip)]
    pub status: SubmissionStatus,

    #[garde(range(min = 0))]
    pub no_of_retries: i32,

    #[garde(skip)]
    pub version: String,

    #[garde(skip)]
    pub environment: String,
}

impl Submission {
    /// Identity used to namespace scratch files: user id, then email, then record id.
    pub fn scratch_identity(&self) -> String {
        let raw = self
            .user_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| Some(self.email.as_str()).filter(|e| !e.trim().is_empty()))
            .unwrap_or(&self.id);

        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect()
    }
}

/// Ephemeral unit of work: one submission waiting in the task queue.
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: AssessmentType,
    pub submission: Submission,
}

impl Task {
    pub fn new(submission: Submission) -> Self {
        Self {
            kind: submission.assessment_type,
            submission,
        }
    }
}
