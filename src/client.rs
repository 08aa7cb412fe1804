use crate::error::ProviderError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, ResponseFormat,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// One chat-completion call: a system message, a user message and sampling settings
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    /// Ask the provider to constrain output to a JSON object
    pub json_response: bool,
}

/// A chat model that turns a request into response text.
///
/// Implementations never retry; callers decide what to do with a
/// [`ProviderError`].
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &ChatRequest, api_key: &str) -> Result<String, ProviderError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAiClient {
    http: reqwest::Client,
    api_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl OpenAiClient {
    pub fn new(api_endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_endpoint: api_endpoint.into(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_endpoint.trim_end_matches('/'))
    }

    /// Build the chat completion request body
    fn build_request(request: &ChatRequest) -> Result<CreateChatCompletionRequest, ProviderError> {
        let system_message: ChatCompletionRequestMessage =
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_prompt.clone())
                .build()
                .map_err(|e| ProviderError::Request(e.to_string()))?
                .into();

        let user_message: ChatCompletionRequestMessage =
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user_prompt.clone())
                .build()
                .map_err(|e| ProviderError::Request(e.to_string()))?
                .into();

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&request.model)
            .messages([system_message, user_message])
            .temperature(request.temperature);
        if request.json_response {
            args.response_format(ResponseFormat::JsonObject);
        }

        args.build().map_err(|e| ProviderError::Request(e.to_string()))
    }

    /// Turn a non-success response body into a provider error
    fn api_error(status: u16, body: &str) -> ProviderError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => ProviderError::Api {
                status,
                message: envelope.error.message,
                code: envelope
                    .error
                    .code
                    .and_then(|code| code.as_str().map(str::to_string)),
            },
            Err(_) => ProviderError::Api {
                status,
                message: body.to_string(),
                code: None,
            },
        }
    }

    /// First choice's message content, or empty when the provider sent none
    fn extract_content(response: CreateChatCompletionResponse) -> String {
        match response.choices.into_iter().next() {
            Some(choice) => choice.message.content.unwrap_or_default(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, request: &ChatRequest, api_key: &str) -> Result<String, ProviderError> {
        let body = Self::build_request(request)?;

        debug!(model = %request.model, "sending chat completion request");
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), &text));
        }

        let completion: CreateChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(Self::extract_content(completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json_response: bool) -> ChatRequest {
        ChatRequest {
            model: "gpt-4o".to_string(),
            system_prompt: "You are a strict grader.".to_string(),
            user_prompt: "Grade this.".to_string(),
            temperature: 0.7,
            json_response,
        }
    }

    fn completion_body(content: Option<&str>) -> String {
        serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1_700_000_000u32,
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20 }
        })
        .to_string()
    }

    #[test]
    fn test_build_request_messages() {
        let body = OpenAiClient::build_request(&request(false)).unwrap();
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], "You are a strict grader.");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "Grade this.");
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn test_build_request_json_mode() {
        let body = OpenAiClient::build_request(&request(true)).unwrap();
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_api_error_parses_envelope() {
        let body = r#"{"error": {"message": "Rate limit reached", "type": "requests", "code": "rate_limit_exceeded"}}"#;
        let err = OpenAiClient::api_error(429, body);
        match &err {
            ProviderError::Api { status, message, code } => {
                assert_eq!(*status, 429);
                assert_eq!(message, "Rate limit reached");
                assert_eq!(code.as_deref(), Some("rate_limit_exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_api_error_plain_body() {
        let err = OpenAiClient::api_error(502, "Bad Gateway");
        assert_eq!(err.to_string(), "provider returned 502: Bad Gateway");
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body(Some("Hello there")))
            .create_async()
            .await;

        let client = OpenAiClient::new(server.url());
        let output = client.complete(&request(false), "sk-test").await.unwrap();

        assert_eq!(output, "Hello there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_missing_content_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body(None))
            .create_async()
            .await;

        let client = OpenAiClient::new(format!("{}/", server.url()));
        let output = client.complete(&request(false), "sk-test").await.unwrap();
        assert_eq!(output, "");
    }

    #[tokio::test]
    async fn test_complete_surfaces_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"message": "Rate limit reached", "code": "rate_limit_exceeded"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = OpenAiClient::new(server.url());
        let err = client.complete(&request(false), "sk-test").await.unwrap_err();

        assert!(err.is_rate_limited());
        // No retry at this layer
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_complete_undecodable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body("not a completion")
            .create_async()
            .await;

        let client = OpenAiClient::new(server.url());
        let err = client.complete(&request(false), "sk-test").await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
