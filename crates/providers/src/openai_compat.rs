//! OpenAI-compatible provider implementation.
//!
//! Works with: Gemini (via its OpenAI-compatible endpoint), OpenAI,
//! OpenRouter, Ollama, and any endpoint exposing `/chat/completions`.
//!
//! One request, one complete answer. No streaming, no retries.

use async_trait::async_trait;
use fintrack_core::error::ProviderError;
use fintrack_core::message::{Message, Role};
use fintrack_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// An OpenAI-compatible chat-completions provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }

    /// Turn a decoded completion into a [`ProviderResponse`].
    ///
    /// A missing choice or blank content is an [`ProviderError::EmptyResponse`].
    fn into_response(
        api_response: ApiResponse,
        requested_model: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let content = choice.message.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message: Message::new(Role::Assistant, content),
            usage,
            model: api_response
                .model
                .unwrap_or_else(|| requested_model.to_string()),
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::into_response(api_response, &request.model)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_keeps_name() {
        let provider = OpenAiCompatProvider::new("gemini", "https://example.test/v1", "key");
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://localhost:8000/v1/", "k");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn message_conversion_preserves_order_and_roles() {
        let messages = vec![
            Message::system("instructions"),
            Message::user("What is my balance?"),
            Message::assistant("It is 100."),
        ];
        let api = OpenAiCompatProvider::to_api_messages(&messages);
        let roles: Vec<_> = api.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
        assert_eq!(api[1].content.as_deref(), Some("What is my balance?"));
    }

    #[test]
    fn request_body_shape() {
        let request = ProviderRequest {
            model: "gemini-1.5-flash".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.2,
            max_tokens: Some(512),
        };
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["model"], "gemini-1.5-flash");
        assert_eq!(body["stream"], false);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["messages"][0]["role"], "user");

        let no_limit = ProviderRequest {
            max_tokens: None,
            ..request
        };
        assert!(OpenAiCompatProvider::request_body(&no_limit)
            .get("max_tokens")
            .is_none());
    }

    #[test]
    fn parse_completion_response() {
        let raw = r#"{
            "model": "gemini-1.5-flash",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Your balance is $10."}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 6, "total_tokens": 18}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = OpenAiCompatProvider::into_response(parsed, "requested").unwrap();

        assert_eq!(response.message.role, Role::Assistant);
        assert_eq!(response.message.content, "Your balance is $10.");
        assert_eq!(response.model, "gemini-1.5-flash");
        assert_eq!(response.usage.unwrap().total_tokens, 18);
    }

    #[test]
    fn missing_model_falls_back_to_requested() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": "ok"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = OpenAiCompatProvider::into_response(parsed, "gpt-4o-mini").unwrap();
        assert_eq!(response.model, "gpt-4o-mini");
        assert!(response.usage.is_none());
    }

    #[test]
    fn no_choices_is_empty_response() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = OpenAiCompatProvider::into_response(parsed, "m").unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[test]
    fn blank_content_is_empty_response() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": "  "}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            OpenAiCompatProvider::into_response(parsed, "m"),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let provider = OpenAiCompatProvider::new("dead", "http://127.0.0.1:1", "k");
        let request = ProviderRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.7,
            max_tokens: None,
        };
        let err = provider.complete(request).await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Network(_) | ProviderError::Timeout(_)
        ));
    }
}
