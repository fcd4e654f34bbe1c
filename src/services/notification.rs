use async_trait::async_trait;
use reqwest::Client;

use crate::models::evaluation::EvaluationResult;

/// Outbound channel for reviewer notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel_id: &str, content: &str) -> Result<(), NotifyError>;
}

/// Posts interactive message cards to a chat webhook.
pub struct WebhookNotifier {
    http: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: &str) -> Self {
        Self {
            http: Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(&self, channel_id: &str, content: &str) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&serde_json::json!({
                "receive_id": channel_id,
                "msg_type": "interactive",
                "content": content,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}

/// Minimal interactive card summarizing a stored result.
pub fn render_card(result: &EvaluationResult, share_url: &str) -> String {
    let verdict = if result.passed { "PASSED" } else { "BELOW THRESHOLD" };
    serde_json::json!({
        "header": {
            "title": format!("{} – {}", result.assessment_type, result.name),
        },
        "elements": [
            {
                "tag": "markdown",
                "content": format!(
                    "**Score:** {} ({})\n**Pronunciation:** {}  **Fluency:** {}  **Pacing:** {}  **Speaking rate:** {}\n**Accuracy:** {:.2}  **Correct words:** {}/{}",
                    result.composite_score,
                    verdict,
                    result.scores.pronunciation,
                    result.scores.fluency,
                    result.scores.pacing,
                    result.scores.speaking_rate,
                    result.scores.similarity,
                    result.correct_word_count,
                    result.total_word_count,
                ),
            },
            { "tag": "markdown", "content": result.evaluation },
            {
                "tag": "action",
                "actions": [{ "tag": "button", "text": "View result", "url": share_url }],
            }
        ]
    })
    .to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook returned status {0}")]
    Status(u16),
}
