use crate::models::submission::AssessmentType;
use crate::services::grading::GradingPrompt;
use crate::services::scoring::WeightSet;
use crate::services::transcriber::TranscribeOptions;

/// Script reading comes in two flavours with different thresholds, weights
/// and reference lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptReadingVariant {
    Standard,
    Enhanced,
}

/// Where the pipeline finds the text a recording is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSource {
    /// Look up `reference_key` in the reference store.
    Store,
    /// Use the `given_transcription` carried by the submission.
    Inline,
}

/// Per-assessment behaviour of the evaluation pipeline, expressed as data.
#[derive(Debug, Clone)]
pub struct EvaluationProfile {
    pub assessment_type: AssessmentType,
    /// Recordings shorter than this (after silence trimming) are rejected.
    /// Inclusive: exactly the threshold passes.
    pub min_duration_secs: f64,
    pub weights: WeightSet,
    pub reference_source: ReferenceSource,
    pub prompt: GradingPrompt,
    pub transcribe: TranscribeOptions,
}

impl EvaluationProfile {
    pub fn for_assessment(
        assessment_type: AssessmentType,
        variant: ScriptReadingVariant,
        transcribe: TranscribeOptions,
    ) -> Self {
        let prompt = GradingPrompt::for_assessment(assessment_type);
        let (min_duration_secs, weights, reference_source) = match (assessment_type, variant) {
            (AssessmentType::ScriptReading, ScriptReadingVariant::Standard) => {
                (30.0, WeightSet::set_a(), ReferenceSource::Store)
            }
            (AssessmentType::ScriptReading, ScriptReadingVariant::Enhanced) => {
                (20.0, WeightSet::set_b(), ReferenceSource::Inline)
            }
            (AssessmentType::QuoteTranslation | AssessmentType::PhotoInterpretation, _) => {
                (0.0, WeightSet::set_a(), ReferenceSource::Store)
            }
        };

        Self {
            assessment_type,
            min_duration_secs,
            weights,
            reference_source,
            prompt,
            transcribe,
        }
    }

    /// Whole seconds of the threshold, as written into the too-short status.
    pub fn threshold_secs(&self) -> u32 {
        self.min_duration_secs as u32
    }

    pub fn accepts_duration(&self, duration_secs: f64) -> bool {
        duration_secs >= self.min_duration_secs
    }
}
