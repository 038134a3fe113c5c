use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

use super::{ExtractionError, VisionProvider};
use crate::shared::config::Config;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Распознавание через Anthropic Messages API.
pub struct ClaudeVision {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeVision {
    pub fn from_config(cfg: &Config) -> Result<Self, ExtractionError> {
        if cfg.secrets.anthropic_api_key.trim().is_empty() {
            return Err(ExtractionError::NotConfigured(
                "claude",
                "ANTHROPIC_API_KEY is not set",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.vision.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;

        Ok(Self {
            client,
            api_key: cfg.secrets.anthropic_api_key.clone(),
            model: cfg.vision.claude_model.clone(),
            max_tokens: cfg.vision.max_tokens,
        })
    }
}

#[async_trait]
impl VisionProvider for ClaudeVision {
    async fn extract_raw(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ExtractionError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": mime_type,
                            "data": general_purpose::STANDARD.encode(image),
                        },
                    },
                    { "type": "text", "text": prompt },
                ],
            }],
        });

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Timeout
                } else {
                    ExtractionError::Backend(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Backend(format!(
                "Anthropic API returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;

        payload["content"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ExtractionError::Backend("Anthropic response has no text content".into())
            })
    }

    fn provider_name(&self) -> &'static str {
        "claude"
    }
}
