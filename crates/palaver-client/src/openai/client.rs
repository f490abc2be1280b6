//! OpenAI-compatible client implementation.
//!
//! Sends non-streaming chat completions to `OpenAI` or any compatible
//! endpoint (a local server, a gateway, a self-hosted model).
//!
//! # Example
//!
//! ```no_run
//! use palaver_client::{LLMClient, OpenAIClient};
//! use palaver_common::{ChatRequest, Config, Message};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("openai", "gpt-4o-mini")
//!     .with_api_key("sk-...")
//!     .with_base_url("https://api.openai.com/v1");
//!
//! let client = OpenAIClient::new(config)?;
//! let request = ChatRequest::new(vec![Message::user("Hello!")]);
//! let response = client.chat(&request).await?;
//!
//! println!("{:?}", response.message.text());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! - **401**: [`ClientError::AuthenticationError`]
//! - **429**: [`ClientError::RateLimitError`]
//! - **5xx**: [`ClientError::ServiceUnavailable`]
//! - **Empty `choices`**: [`ClientError::InvalidResponse`]
//!
//! Retries happen only when `RetryConfig::max_retries` is raised above zero.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use palaver_common::chat::Message;
use palaver_common::client::{ChatRequest, ChatResponse, Config};

use crate::LLMClient;
use crate::error::{ClientError, ErrorResponse};
use crate::openai::{ChatCompletionRequest, ChatCompletionResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for `OpenAI`-compatible chat-completion APIs.
///
/// The API key is optional so keyless local endpoints work; when present it
/// is sent as a bearer token and never appears in `Debug` output.
#[derive(Clone)]
pub struct OpenAIClient {
    client: ClientWithMiddleware,
    api_key: Option<Arc<SecretString>>,
    base_url: String,
    config: Arc<Config>,
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OpenAIClient {
    /// Create a new client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if the base URL cannot be
    /// parsed, or a network error if the HTTP client fails to build.
    pub fn new(config: Config) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        url::Url::parse(&base_url).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid base URL '{base_url}': {e}"))
        })?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(
                config.retry_config.initial_delay,
                config.retry_config.max_delay,
            )
            .build_with_max_retries(config.retry_config.max_retries);

        // None means no timeout
        let reqwest_client = match config.timeout_seconds {
            Some(timeout) => reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()
                .map_err(ClientError::NetworkError)?,
            None => reqwest::Client::builder()
                .build()
                .map_err(ClientError::NetworkError)?,
        };

        let client = reqwest_middleware::ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            api_key: config.api_key.clone().map(Arc::new),
            base_url,
            config: Arc::new(config),
        })
    }

    async fn make_request<T: for<'de> Deserialize<'de>, B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        let response = request_builder
            .body(serde_json::to_string(body).map_err(ClientError::SerializationError)?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.map_err(|e| {
                warn!("Failed to read error response body: {e}");
                ClientError::NetworkError(e)
            })?;

            let error_message = match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(parsed) => parsed.error.message,
                Err(parse_err) => {
                    debug!("Failed to parse error response as JSON: {parse_err}. Using raw text.");
                    error_text
                }
            };

            error!(
                "API request failed with status {}: {}",
                status.as_u16(),
                error_message
            );

            return Err(match status.as_u16() {
                401 => ClientError::AuthenticationError(error_message),
                429 => ClientError::RateLimitError,
                400 | 404 | 422 => ClientError::InvalidRequest(error_message),
                code if status.is_server_error() => {
                    ClientError::ServiceUnavailable(format!("{code}: {error_message}"))
                }
                code => ClientError::RequestError {
                    status: code,
                    message: error_message,
                },
            });
        }

        let response_text = response.text().await?;
        debug!("Raw API response: {response_text}");

        serde_json::from_str(&response_text).map_err(ClientError::SerializationError)
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    fn config(&self) -> &Config {
        &self.config
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.validate_request(request)?;

        let openai_request = ChatCompletionRequest::from((request, self.config.as_ref()));
        debug!(
            "Sending chat completion: model={}, messages={}, tools={}",
            openai_request.model,
            openai_request.messages.len(),
            openai_request.tools.as_ref().map_or(0, Vec::len)
        );

        let response: ChatCompletionResponse = self
            .make_request("chat/completions", &openai_request)
            .await?;

        let Some(choice) = response.choices.into_iter().next() else {
            warn!(
                "Received empty choices array from API. Response ID: {}, Model: {}",
                response.id, response.model
            );
            return Err(
                ClientError::InvalidResponse("API returned no choices in response".to_string())
                    .into(),
            );
        };

        let finish_reason = choice
            .finish_reason
            .as_ref()
            .and_then(|reason| reason.parse().ok());

        Ok(ChatResponse {
            message: Message::from(choice.message),
            model: response.model,
            usage: response.usage,
            finish_reason,
            created_at: DateTime::from_timestamp(response.created, 0).unwrap_or_else(Utc::now),
            response_id: Some(response.id),
        })
    }

    fn supports_tools(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;
    use palaver_common::chat::MessageRole;
    use palaver_common::client::{FinishReason, ToolChoice};
    use palaver_common::tools::{Tool, ToolDescriptor};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(base_url: &str) -> Config {
        Config::new("openai", "gpt-4")
            .with_api_key("test-key")
            .with_base_url(base_url)
    }

    fn completion(message: serde_json::Value, finish_reason: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1_677_652_288,
            "model": "gpt-4",
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": finish_reason
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 20,
                "total_tokens": 30
            }
        })
    }

    #[tokio::test]
    async fn test_successful_chat_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                serde_json::json!({"role": "assistant", "content": "Hello! How can I help?"}),
                "stop",
            )))
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let request = ChatRequest::new(vec![Message::user("Hello")]);

        let response = client.chat(&request).await.unwrap();

        assert_eq!(response.model, "gpt-4");
        assert_eq!(response.message.text(), Some("Hello! How can I help?"));
        assert_eq!(response.message.role, MessageRole::Assistant);
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.response_id.as_deref(), Some("chatcmpl-123"));
        assert_eq!(response.usage.unwrap().total_tokens, 30);
    }

    #[tokio::test]
    async fn test_request_body_carries_call_policy() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "tool_choice": "auto",
                "parallel_tool_calls": false,
                "tools": [{"type": "function", "function": {"name": "get_time"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                serde_json::json!({"role": "assistant", "content": "ok"}),
                "stop",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let descriptor = ToolDescriptor::new("get_time", serde_json::json!({"type": "object"}));
        let request = ChatRequest::new(vec![Message::user("time?")])
            .with_tools(vec![Tool::from(&descriptor)])
            .with_tool_choice(ToolChoice::Auto)
            .with_parallel_tool_calls(false);

        client.chat(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_tool_call_reply() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                serde_json::json!({
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_42",
                        "type": "function",
                        "function": {"name": "get_time", "arguments": "{\"tz\":\"UTC\"}"}
                    }]
                }),
                "tool_calls",
            )))
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let request = ChatRequest::new(vec![Message::user("time?")]);

        let response = client.chat(&request).await.unwrap();

        assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
        assert!(response.message.content.is_none());
        assert_eq!(response.message.tool_calls.len(), 1);
        let call = &response.message.tool_calls[0];
        assert_eq!(call.id, "call_42");
        assert_eq!(call.function.name, "get_time");
        assert_eq!(call.function.arguments, r#"{"tz":"UTC"}"#);
    }

    #[tokio::test]
    async fn test_unknown_finish_reason() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                serde_json::json!({"role": "assistant", "content": "x"}),
                "unknown_reason",
            )))
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let response = client
            .chat(&ChatRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap();

        assert_eq!(response.finish_reason, None);
    }

    #[tokio::test]
    async fn test_authentication_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {
                    "message": "Invalid API key",
                    "type": "invalid_request_error",
                    "code": "invalid_api_key"
                }
            })))
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let err = client
            .chat(&ChatRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap_err();

        match err.downcast_ref::<ClientError>() {
            Some(ClientError::AuthenticationError(msg)) => assert_eq!(msg, "Invalid API key"),
            other => panic!("Expected AuthenticationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_is_not_retried_by_default() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Rate limit exceeded"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let err = client
            .chat(&ChatRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::RateLimitError)
        ));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_service_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let err = client
            .chat(&ChatRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap_err();

        match err.downcast_ref::<ClientError>() {
            Some(ClientError::ServiceUnavailable(msg)) => assert!(msg.contains("upstream down")),
            other => panic!("Expected ServiceUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_model_is_invalid_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"message": "The model `nope` does not exist"}
            })))
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let err = client
            .chat(&ChatRequest::new(vec![Message::user("Hello")]).with_model("nope"))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_choices_array() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-123",
                "object": "chat.completion",
                "created": 1_677_652_288,
                "model": "gpt-4",
                "choices": []
            })))
            .mount(&mock_server)
            .await;

        let client = OpenAIClient::new(create_test_config(&mock_server.uri())).unwrap();
        let err = client
            .chat(&ChatRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap_err();

        match err.downcast_ref::<ClientError>() {
            Some(ClientError::InvalidResponse(msg)) => assert!(msg.contains("no choices")),
            other => panic!("Expected InvalidResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_keyless_endpoint_sends_no_authorization() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                serde_json::json!({"role": "assistant", "content": "local"}),
                "stop",
            )))
            .mount(&mock_server)
            .await;

        let config = Config::new("ollama", "llama3").with_base_url(mock_server.uri());
        let client = OpenAIClient::new(config).unwrap();

        let response = client
            .chat(&ChatRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap();
        assert_eq!(response.message.text(), Some("local"));

        let received = mock_server.received_requests().await.expect("recording enabled");
        assert!(received[0].headers.get("authorization").is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        let config = Config::new("openai", "gpt-4").with_base_url("not a url");
        let err = OpenAIClient::new(config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = OpenAIClient::new(create_test_config("http://localhost:1234")).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("test-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}
