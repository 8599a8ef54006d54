use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletionRequest {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub prompt: String,
}

#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<String, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestChatCompletionClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct ChatCompletionPayload {
    choices: Option<Vec<ChatChoicePayload>>,
    error: Option<ChatErrorPayload>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatChoicePayload {
    message: ChatMessagePayload,
}

#[derive(Debug, serde::Deserialize)]
struct ChatMessagePayload {
    content: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct ChatErrorPayload {
    message: Option<String>,
}

impl ReqwestChatCompletionClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Advisor(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn chat_http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("chat api error: http {}", status.as_u16())
        } else {
            format!("chat api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Advisor(message)
    }
}

#[async_trait]
impl ChatCompletionClient for ReqwestChatCompletionClient {
    async fn complete(&self, request: ChatCompletionRequest) -> Result<String, InfraError> {
        Self::ensure_non_empty(&request.api_key, "api key")?;
        Self::ensure_non_empty(&request.model, "model")?;

        let endpoint = Url::parse(&request.endpoint).map_err(|error| {
            InfraError::Advisor(format!("invalid chat endpoint '{}': {error}", request.endpoint))
        })?;

        let payload = json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        let response = self
            .client
            .post(endpoint)
            .bearer_auth(&request.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| InfraError::Advisor(format!("chat request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Advisor(format!("failed reading chat response: {error}")))?;

        if !status.is_success() {
            return Err(Self::chat_http_error(status, &body));
        }

        let parsed: ChatCompletionPayload = serde_json::from_str(&body).map_err(|error| {
            InfraError::Advisor(format!("invalid chat payload: {error}; body={body}"))
        })?;

        if let Some(error) = parsed.error {
            let detail = error.message.unwrap_or_else(|| body.clone());
            return Err(InfraError::Advisor(format!("chat api rejected request: {detail}")));
        }

        let content = parsed
            .choices
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}
