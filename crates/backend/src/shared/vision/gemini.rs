use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

use super::{ExtractionError, VisionProvider};
use crate::shared::config::Config;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Распознавание через Google Gemini generateContent API.
pub struct GeminiVision {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl GeminiVision {
    pub fn from_config(cfg: &Config) -> Result<Self, ExtractionError> {
        if cfg.secrets.google_api_key.trim().is_empty() {
            return Err(ExtractionError::NotConfigured(
                "gemini",
                "GOOGLE_API_KEY is not set",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.vision.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;

        Ok(Self {
            client,
            api_key: cfg.secrets.google_api_key.clone(),
            model: cfg.vision.gemini_model.clone(),
            max_tokens: cfg.vision.max_tokens,
        })
    }
}

#[async_trait]
impl VisionProvider for GeminiVision {
    async fn extract_raw(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ExtractionError> {
        let url = format!("{}/{}:generateContent", API_BASE, self.model);

        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    {
                        "inline_data": {
                            "mime_type": mime_type,
                            "data": general_purpose::STANDARD.encode(image),
                        },
                    },
                    { "text": prompt },
                ],
            }],
            "generationConfig": { "maxOutputTokens": self.max_tokens },
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
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
                "Gemini API returned HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;

        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ExtractionError::Backend("Gemini response has no text part".into()))
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}
