//! Pure scoring functions for recorded assessments.
//!
//! Every sub-score is on a 1–5 ordinal scale (similarity is continuous on
//! 0–5). The composite combines sub-scores with a validated weight set into
//! a 0–100 integer.

use serde::{Deserialize, Serialize};

/// Composite scores at or above this value pass.
pub const PASS_THRESHOLD: u32 = 80;

/// Tolerance for weight sets summing to 1.0.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Sub-scores that can take part in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubScore {
    Pronunciation,
    SpeakingRate,
    Similarity,
    Fluency,
    Pacing,
    PitchStability,
}

/// All sub-scores computed for one recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub pronunciation: u8,
    pub fluency: u8,
    pub speaking_rate: u8,
    pub similarity: f64,
    pub pacing: u8,
    pub pitch_stability: u8,
}

impl SubScores {
    pub fn get(&self, score: SubScore) -> f64 {
        match score {
            SubScore::Pronunciation => f64::from(self.pronunciation),
            SubScore::SpeakingRate => f64::from(self.speaking_rate),
            SubScore::Similarity => self.similarity,
            SubScore::Fluency => f64::from(self.fluency),
            SubScore::Pacing => f64::from(self.pacing),
            SubScore::PitchStability => f64::from(self.pitch_stability),
        }
    }
}

/// Weights applied to sub-scores; always sums to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSet {
    name: String,
    weights: Vec<(SubScore, f64)>,
}

impl WeightSet {
    pub fn new(name: impl Into<String>, weights: Vec<(SubScore, f64)>) -> Result<Self, ScoringError> {
        let name = name.into();

        for (i, (score, weight)) in weights.iter().enumerate() {
            if !(0.0..=1.0).contains(weight) {
                return Err(ScoringError::WeightOutOfRange { score: *score, weight: *weight });
            }
            if weights[..i].iter().any(|(other, _)| other == score) {
                return Err(ScoringError::DuplicateWeight(*score));
            }
        }

        let sum: f64 = weights.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ScoringError::WeightSum { name, sum });
        }

        Ok(Self { name, weights })
    }

    /// Pronunciation .25, speaking rate .15, similarity .20, fluency .25, pacing .15.
    pub fn set_a() -> Self {
        Self {
            name: "a".to_string(),
            weights: vec![
                (SubScore::Pronunciation, 0.25),
                (SubScore::SpeakingRate, 0.15),
                (SubScore::Similarity, 0.20),
                (SubScore::Fluency, 0.25),
                (SubScore::Pacing, 0.15),
            ],
        }
    }

    /// Pronunciation .25, fluency .15, speaking rate .15, similarity .25,
    /// pitch stability .10, pacing .10.
    pub fn set_b() -> Self {
        Self {
            name: "b".to_string(),
            weights: vec![
                (SubScore::Pronunciation, 0.25),
                (SubScore::Fluency, 0.15),
                (SubScore::SpeakingRate, 0.15),
                (SubScore::Similarity, 0.25),
                (SubScore::PitchStability, 0.10),
                (SubScore::Pacing, 0.10),
            ],
        }
    }

    pub fn by_name(name: &str) -> Result<Self, ScoringError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(Self::set_a()),
            "b" => Ok(Self::set_b()),
            other => Err(ScoringError::UnknownWeightSet(other.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weights(&self) -> &[(SubScore, f64)] {
        &self.weights
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Weight set {name:?} sums to {sum}, expected 1.0")]
    WeightSum { name: String, sum: f64 },

    #[error("Weight {weight} for {score:?} is outside 0.0..=1.0")]
    WeightOutOfRange { score: SubScore, weight: f64 },

    #[error("Sub-score {0:?} weighted more than once")]
    DuplicateWeight(SubScore),

    #[error("Unknown weight set: {0:?}")]
    UnknownWeightSet(String),
}

/// Round half away from zero after discarding binary noise below 1e-6, so
/// that values such as `79.49999999999999` meant as `79.5` round up.
pub fn round_score(value: f64) -> f64 {
    ((value * 1e6).round() / 1e6).round()
}

/// Words per minute over the measured recording duration.
pub fn words_per_minute(word_count: usize, duration_secs: f64) -> f64 {
    if duration_secs <= 0.0 {
        return 0.0;
    }
    word_count as f64 / (duration_secs / 60.0)
}

/// Speaking-rate category from words per minute.
///
/// | wpm | category |
/// |---|---|
/// | [0, 80) | 2 |
/// | [80, 120] | 3 |
/// | (120, 160] | 5 |
/// | (160, 200] | 4 |
/// | otherwise | 1 |
pub fn speaking_rate_category(wpm: f64) -> u8 {
    if (0.0..80.0).contains(&wpm) {
        2
    } else if (80.0..=120.0).contains(&wpm) {
        3
    } else if wpm > 120.0 && wpm <= 160.0 {
        5
    } else if wpm > 160.0 && wpm <= 200.0 {
        4
    } else {
        1
    }
}

/// Pause category from the average inter-utterance pause in seconds.
pub fn pause_category(avg_pause_secs: f64) -> u8 {
    if avg_pause_secs <= 0.2 {
        5
    } else if avg_pause_secs <= 0.4 {
        4
    } else if avg_pause_secs <= 0.6 {
        3
    } else if avg_pause_secs <= 0.8 {
        2
    } else {
        1
    }
}

/// `round((speaking_rate_category + pause_category) / 2) + 1`, with the mean
/// rounded half to even.
pub fn pacing_score(speaking_rate_category: u8, pause_category: u8) -> u8 {
    let mean = (f64::from(speaking_rate_category) + f64::from(pause_category)) / 2.0;
    mean.round_ties_even() as u8 + 1
}

/// Pitch-stability score from the ratio of pitch peaks to voiced frames.
pub fn pitch_stability_score(peak_ratio: f64) -> u8 {
    if peak_ratio < 0.1 {
        1
    } else if peak_ratio < 0.222 {
        2
    } else if peak_ratio < 0.223 {
        3
    } else if peak_ratio < 0.224 {
        4
    } else {
        5
    }
}

/// Lexical similarity on a 0–5 scale from the Levenshtein distance between
/// two already-normalized texts. Two empty texts score 0.
pub fn similarity_score(transcript: &str, reference: &str) -> f64 {
    let max_len = transcript.chars().count().max(reference.chars().count());
    if max_len == 0 {
        return 0.0;
    }

    let distance = strsim::levenshtein(transcript, reference);
    let similarity = (1.0 - distance as f64 / max_len as f64) * 5.0;
    similarity.min(5.0)
}

/// `round(100 * Σ weight_i * (subscore_i / 5))`, clamped to 0..=100.
pub fn composite_score(scores: &SubScores, weights: &WeightSet) -> u32 {
    let raw: f64 = weights
        .weights()
        .iter()
        .map(|(score, weight)| weight * (scores.get(*score) / 5.0))
        .sum();

    round_score(raw * 100.0).clamp(0.0, 100.0) as u32
}

pub fn passes(composite: u32) -> bool {
    composite >= PASS_THRESHOLD
}
