use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};

use super::{ExtractionError, VisionProvider};
use crate::shared::config::Config;

const XAI_API_BASE: &str = "https://api.x.ai/v1";

/// Распознавание через xAI Grok (OpenAI-совместимый API).
pub struct GrokVision {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
}

impl GrokVision {
    pub fn from_config(cfg: &Config) -> Result<Self, ExtractionError> {
        if cfg.secrets.xai_api_key.trim().is_empty() {
            return Err(ExtractionError::NotConfigured(
                "grok",
                "XAI_API_KEY is not set",
            ));
        }
        let config = OpenAIConfig::new()
            .with_api_key(cfg.secrets.xai_api_key.clone())
            .with_api_base(XAI_API_BASE);

        Ok(Self {
            client: Client::with_config(config),
            model: cfg.vision.grok_model.clone(),
            max_tokens: cfg.vision.max_tokens,
        })
    }
}

#[async_trait]
impl VisionProvider for GrokVision {
    async fn extract_raw(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ExtractionError> {
        let data_url = format!(
            "data:{};base64,{}",
            mime_type,
            general_purpose::STANDARD.encode(image)
        );

        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(data_url)
                    .detail(ImageDetail::Auto)
                    .build()
                    .map_err(|e| ExtractionError::Backend(e.to_string()))?,
            )
            .build()
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;

        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(prompt)
            .build()
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;

        let user_message = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(vec![
                image_part.into(),
                text_part.into(),
            ]))
            .build()
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_completion_tokens(self.max_tokens)
            .messages(vec![user_message.into()])
            .build()
            .map_err(|e| ExtractionError::Backend(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("timed out") || err_str.contains("timeout") {
                ExtractionError::Timeout
            } else {
                ExtractionError::Backend(err_str)
            }
        })?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| ExtractionError::Backend("No response from xAI API".into()))?;

        choice
            .message
            .content
            .clone()
            .ok_or_else(|| ExtractionError::Backend("xAI response has no text content".into()))
    }

    fn provider_name(&self) -> &'static str {
        "grok"
    }
}
