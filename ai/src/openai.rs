//! Hosted backend (OpenAI-compatible HTTPS API).
//!
//! Structured calls enforce the JSON response format; free-form chat runs at
//! temperature 0.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionResponseFormat, ChatCompletionResponseFormatType,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

use crate::errors::LlmError;
use crate::LlmService;

pub struct OpenAiService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiService {
    /// The client reads OPENAI_API_KEY (and OPENAI_API_BASE) from the
    /// environment.
    pub fn new(model: &str) -> Result<Self, LlmError> {
        if std::env::var("OPENAI_API_KEY").is_err() {
            return Err(LlmError::Unavailable(
                "OPENAI_API_KEY environment variable must be set".to_string(),
            ));
        }
        Ok(Self {
            client: Client::new(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmService for OpenAiService {
    async fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(0.0)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| LlmError::Api(e.to_string()))?
                .into()])
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| LlmError::MalformedResponse("empty completion".to_string()))
    }

    async fn chat_json(
        &self,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(temperature)
            .response_format(ChatCompletionResponseFormat {
                r#type: ChatCompletionResponseFormatType::JsonObject,
            })
            .messages([
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| LlmError::Api(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| LlmError::Api(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| LlmError::MalformedResponse("empty completion".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
