use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::models::evaluation::GradingOutcome;
use crate::models::submission::AssessmentType;

/// Prompt template plus the ordinal criteria the grader must return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingPrompt {
    pub template: &'static str,
    pub criteria: Vec<&'static str>,
}

impl GradingPrompt {
    pub fn for_assessment(assessment_type: AssessmentType) -> Self {
        match assessment_type {
            AssessmentType::ScriptReading => Self {
                template: include_str!("../../prompts/script_reading.md"),
                criteria: vec![],
            },
            AssessmentType::QuoteTranslation => Self {
                template: include_str!("../../prompts/quote_translation.md"),
                criteria: vec![
                    "understanding",
                    "insightfulness",
                    "practical_application",
                    "personal_connection",
                ],
            },
            AssessmentType::PhotoInterpretation => Self {
                template: include_str!("../../prompts/photo_interpretation.md"),
                criteria: vec![
                    "analytical_thinking",
                    "originality",
                    "language",
                    "support",
                    "organization",
                    "focus_point",
                ],
            },
        }
    }

    pub fn render(&self, transcript: &str, reference: &str) -> String {
        self.template
            .replace("{reference}", reference)
            .replace("{transcription}", transcript)
            .replace("{criteria}", &self.criteria.join(", "))
    }
}

/// Language-model collaborator producing the reviewer narrative.
#[async_trait]
pub trait Grader: Send + Sync {
    async fn evaluate(
        &self,
        prompt: &GradingPrompt,
        transcript: &str,
        reference: &str,
    ) -> Result<GradingOutcome, GradingError>;
}

/// Client for an OpenAI-compatible chat completion endpoint.
pub struct ChatGrader {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl ChatGrader {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Grader for ChatGrader {
    async fn evaluate(
        &self,
        prompt: &GradingPrompt,
        transcript: &str,
        reference: &str,
    ) -> Result<GradingOutcome, GradingError> {
        let request_body = serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "user", "content": prompt.render(transcript, reference) }
            ]
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GradingError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(GradingError::EmptyResponse)?;

        parse_outcome(&content, &prompt.criteria)
    }
}

/// Parse the JSON object embedded in a model reply and check that every
/// required criterion is present and on the 1–5 scale.
pub fn parse_outcome(content: &str, required: &[&str]) -> Result<GradingOutcome, GradingError> {
    let start = content.find('{').ok_or(GradingError::EmptyResponse)?;
    let end = content.rfind('}').ok_or(GradingError::EmptyResponse)?;
    if end < start {
        return Err(GradingError::EmptyResponse);
    }

    let outcome: GradingOutcome = serde_json::from_str(&content[start..=end])?;
    if outcome.evaluation.trim().is_empty() {
        return Err(GradingError::EmptyResponse);
    }

    for name in required {
        match outcome.criteria.get(*name) {
            Some(score) if (1..=5).contains(score) => {}
            Some(score) => {
                return Err(GradingError::CriterionOutOfRange {
                    name: name.to_string(),
                    score: *score,
                })
            }
            None => return Err(GradingError::MissingCriterion(name.to_string())),
        }
    }

    Ok(outcome)
}

#[derive(Debug, thiserror::Error)]
pub enum GradingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Grading provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Grading response had no evaluation")]
    EmptyResponse,

    #[error("Failed to parse grading response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Grading response is missing criterion {0:?}")]
    MissingCriterion(String),

    #[error("Criterion {name:?} scored {score}, expected 1-5")]
    CriterionOutOfRange { name: String, score: u8 },
}
