use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Which quality model to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityAspect {
    Pronunciation,
    Fluency,
}

/// Ordinal label returned by an audio quality model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityLabel {
    Poor,
    Average,
    Excellent,
}

impl QualityLabel {
    pub fn score(&self) -> u8 {
        match self {
            QualityLabel::Poor => 1,
            QualityLabel::Average => 3,
            QualityLabel::Excellent => 5,
        }
    }

    /// Map a model label; fluency models say Influent/Fluent. Unknown
    /// labels count as Poor.
    pub fn from_model_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "excellent" | "fluent" => QualityLabel::Excellent,
            "average" => QualityLabel::Average,
            _ => QualityLabel::Poor,
        }
    }
}

/// Pretrained audio quality classifier, treated as a black box.
#[async_trait]
pub trait AudioQualityClassifier: Send + Sync {
    async fn predict(&self, aspect: QualityAspect, audio_path: &Path) -> Result<QualityLabel, ClassifierError>;
}

/// Client for hosted audio-classification models (Hugging Face inference
/// API shape: raw audio in, `[{label, score}]` out).
pub struct InferenceApiClassifier {
    http: Client,
    api_token: String,
    pronunciation_url: String,
    fluency_url: String,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

impl InferenceApiClassifier {
    pub fn new(api_token: &str, pronunciation_url: &str, fluency_url: &str) -> Self {
        Self {
            http: Client::new(),
            api_token: api_token.to_string(),
            pronunciation_url: pronunciation_url.to_string(),
            fluency_url: fluency_url.to_string(),
        }
    }
}

fn top_label(scores: Vec<LabelScore>) -> Result<QualityLabel, ClassifierError> {
    scores
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|best| QualityLabel::from_model_label(&best.label))
        .ok_or(ClassifierError::NoLabels)
}

#[async_trait]
impl AudioQualityClassifier for InferenceApiClassifier {
    async fn predict(&self, aspect: QualityAspect, audio_path: &Path) -> Result<QualityLabel, ClassifierError> {
        let url = match aspect {
            QualityAspect::Pronunciation => &self.pronunciation_url,
            QualityAspect::Fluency => &self.fluency_url,
        };
        let bytes = tokio::fs::read(audio_path).await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_token)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Provider(status.as_u16()));
        }

        let scores: Vec<LabelScore> = response.json().await?;
        top_label(scores)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classifier returned status {0}")]
    Provider(u16),

    #[error("Classifier returned no labels")]
    NoLabels,

    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_scores() {
        assert_eq!(QualityLabel::from_model_label("Poor").score(), 1);
        assert_eq!(QualityLabel::from_model_label("Average").score(), 3);
        assert_eq!(QualityLabel::from_model_label("Excellent").score(), 5);
        assert_eq!(QualityLabel::from_model_label("Fluent"), QualityLabel::Excellent);
        assert_eq!(QualityLabel::from_model_label("Influent"), QualityLabel::Poor);
        assert_eq!(QualityLabel::from_model_label("???"), QualityLabel::Poor);
    }

    #[test]
    fn test_top_label_picks_highest_score() {
        let scores = vec![
            LabelScore { label: "Poor".to_string(), score: 0.1 },
            LabelScore { label: "Excellent".to_string(), score: 0.7 },
            LabelScore { label: "Average".to_string(), score: 0.2 },
        ];
        assert_eq!(top_label(scores).unwrap(), QualityLabel::Excellent);
        assert!(top_label(vec![]).is_err());
    }
}
