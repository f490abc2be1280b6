//! # palaver-client
//!
//! Client library for chat-completion model endpoints.
//!
//! The [`LLMClient`] trait is the seam between invocation logic and the
//! transport. [`OpenAIClient`] implements it for any OpenAI-compatible API.
//!
//! ## Example
//!
//! ```no_run
//! use palaver_client::{LLMClient, OpenAIClient};
//! use palaver_common::{ChatRequest, Config, Message};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("openai", "gpt-4o-mini").with_api_key("your-api-key");
//! let client = OpenAIClient::new(config)?;
//!
//! let request = ChatRequest::new(vec![Message::user("Hello, world!")]);
//! let response = client.chat(&request).await?;
//! println!("Response: {:?}", response.message.text());
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use async_trait::async_trait;

use palaver_common::{ChatRequest, ChatResponse, Config};

pub mod error;
pub mod openai;

pub use error::ClientError;
pub use openai::OpenAIClient;

/// Trait for chat-completion client implementations.
///
/// Errors are returned as `anyhow::Error` wrapping a [`ClientError`] where the
/// failure came from the transport; callers can `downcast_ref` to inspect it.
#[must_use = "LLMClient must be used to make requests"]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Get the client's configuration.
    fn config(&self) -> &Config;

    /// Send a chat completion request and return the first choice.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request fails validation
    /// - Network communication fails
    /// - The API returns an error (authentication, rate limit, unknown model, etc.)
    /// - The response cannot be parsed or carries no choices
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Check if the client supports tool/function calling.
    fn supports_tools(&self) -> bool;

    /// Validate a chat request before sending.
    ///
    /// Checks that:
    /// - At least one message is provided
    /// - The temperature, if set, is within 0.0 to 2.0
    /// - Tools are not used if the client doesn't support them
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    fn validate_request(&self, request: &ChatRequest) -> Result<()> {
        request
            .validate_has_messages()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;

        if request
            .temperature
            .is_some_and(|t| !(0.0..=2.0).contains(&t))
        {
            return Err(ClientError::InvalidTemperature.into());
        }

        if !self.supports_tools() && request.has_tools() {
            return Err(ClientError::ToolsNotSupported.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use palaver_common::chat::Message;
    use palaver_common::tools::{Tool, ToolDescriptor};

    struct MockLLMClient {
        config: Config,
        supports_tools: bool,
    }

    impl MockLLMClient {
        fn new() -> Self {
            Self {
                config: Config::new("mock", "mock-model"),
                supports_tools: true,
            }
        }

        fn without_tools() -> Self {
            Self {
                config: Config::new("mock", "mock-model"),
                supports_tools: false,
            }
        }
    }

    #[async_trait]
    impl LLMClient for MockLLMClient {
        fn config(&self) -> &Config {
            &self.config
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                message: Message::assistant("Test reply"),
                model: "mock-model".to_string(),
                usage: None,
                finish_reason: None,
                created_at: chrono::Utc::now(),
                response_id: Some("test-response".to_string()),
            })
        }

        fn supports_tools(&self) -> bool {
            self.supports_tools
        }
    }

    fn create_test_tool() -> Tool {
        Tool::from(ToolDescriptor::new(
            "test_function",
            serde_json::json!({
                "type": "object",
                "properties": {"arg": {"type": "string"}},
                "required": ["arg"]
            }),
        ))
    }

    #[test]
    fn test_validate_request_empty_messages() {
        let client = MockLLMClient::new();
        let request = ChatRequest::new(Vec::new());

        let error = client.validate_request(&request).unwrap_err();
        let client_error = error.downcast_ref::<ClientError>().unwrap();
        assert!(matches!(client_error, ClientError::InvalidRequest(_)));
    }

    #[test]
    fn test_validate_request_valid() {
        let client = MockLLMClient::new();
        let request = ChatRequest::new(vec![Message::user("hi")]).with_temperature(0.1);

        assert!(client.validate_request(&request).is_ok());
    }

    #[test]
    fn test_validate_request_temperature_out_of_range() {
        let client = MockLLMClient::new();
        let request = ChatRequest::new(vec![Message::user("hi")]).with_temperature(3.0);

        let error = client.validate_request(&request).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ClientError>(),
            Some(ClientError::InvalidTemperature)
        ));
    }

    #[test]
    fn test_validate_request_tools_not_supported() {
        let client = MockLLMClient::without_tools();
        let request =
            ChatRequest::new(vec![Message::user("hi")]).with_tools(vec![create_test_tool()]);

        let error = client.validate_request(&request).unwrap_err();
        let client_error = error.downcast_ref::<ClientError>().unwrap();
        assert!(matches!(client_error, ClientError::ToolsNotSupported));
    }

    #[test]
    fn test_validate_request_no_tools_on_toolless_client() {
        let client = MockLLMClient::without_tools();
        let request = ChatRequest::new(vec![Message::user("hi")]).with_tools(Vec::new());

        assert!(client.validate_request(&request).is_ok());
    }

    #[tokio::test]
    async fn test_chat_method() {
        let client = MockLLMClient::new();
        let request = ChatRequest::new(vec![Message::user("hi")]);

        let response = client.chat(&request).await.unwrap();
        assert_eq!(response.response_id, Some("test-response".to_string()));
        assert_eq!(response.model, "mock-model");
        assert_eq!(client.config().provider, "mock");
    }
}
