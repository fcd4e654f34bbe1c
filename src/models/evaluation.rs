use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::submission::AssessmentType;
use crate::services::scoring::SubScores;

/// Opaque handle of an archived recording in the media store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileToken(pub String);

/// Narrative and ordinal criteria returned by the grading provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradingOutcome {
    pub evaluation: String,
    #[serde(default)]
    pub criteria: BTreeMap<String, u8>,
}

/// Per-assessment part of an evaluation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssessmentDetails {
    ScriptReading {
        correct_word_count: usize,
        total_word_count: usize,
    },
    QuoteTranslation {
        understanding: u8,
        insightfulness: u8,
        practical_application: u8,
        personal_connection: u8,
        criteria_total: u32,
    },
    PhotoInterpretation {
        analytical_thinking: u8,
        originality: u8,
        language: u8,
        support: u8,
        organization: u8,
        focus_point: u8,
    },
}

impl AssessmentDetails {
    /// Build the details for an assessment from grading criteria.
    /// Returns the name of the first missing criterion on failure.
    pub fn from_criteria(
        assessment_type: AssessmentType,
        criteria: &BTreeMap<String, u8>,
        correct_word_count: usize,
        total_word_count: usize,
    ) -> Result<Self, String> {
        let get = |name: &str| criteria.get(name).copied().ok_or_else(|| name.to_string());

        Ok(match assessment_type {
            AssessmentType::ScriptReading => AssessmentDetails::ScriptReading {
                correct_word_count,
                total_word_count,
            },
            AssessmentType::QuoteTranslation => {
                let understanding = get("understanding")?;
                let insightfulness = get("insightfulness")?;
                let practical_application = get("practical_application")?;
                let personal_connection = get("personal_connection")?;
                AssessmentDetails::QuoteTranslation {
                    understanding,
                    insightfulness,
                    practical_application,
                    personal_connection,
                    criteria_total: [understanding, insightfulness, practical_application, personal_connection]
                        .iter()
                        .map(|s| u32::from(*s))
                        .sum(),
                }
            }
            AssessmentType::PhotoInterpretation => AssessmentDetails::PhotoInterpretation {
                analytical_thinking: get("analytical_thinking")?,
                originality: get("originality")?,
                language: get("language")?,
                support: get("support")?,
                organization: get("organization")?,
                focus_point: get("focus_point")?,
            },
        })
    }
}

/// Reviewable outcome of one successful pipeline run. Written once to the
/// result store and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub parent_record_id: String,
    pub assessment_type: AssessmentType,
    pub name: String,
    pub email: String,
    pub reference_key: Option<String>,
    pub transcription: String,
    pub reference_text: String,
    pub audio: FileToken,
    pub evaluation: String,
    pub scores: SubScores,
    pub composite_score: u32,
    pub passed: bool,
    pub words_per_minute: f64,
    pub avg_pause_duration: f64,
    pub audio_duration_seconds: f64,
    pub correct_word_count: usize,
    pub total_word_count: usize,
    pub details: AssessmentDetails,
    pub processing_duration: f64,
    pub version: String,
    pub environment: String,
}

/// Reference to a record created in the result store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub id: String,
}

/// A stored result as read back from the result store.
#[derive(Debug, Clone)]
pub struct StoredResult {
    pub id: String,
    pub share_url: String,
    pub created_at: DateTime<Utc>,
    pub result: EvaluationResult,
}
