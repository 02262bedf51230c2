//! OpenAI-compatible chat completions client implementing [`TextGenerator`].

use std::time::Duration;

use async_trait::async_trait;
use forumplan_core::config::DEFAULT_MODEL;
use forumplan_core::{GenerationRequest, ProviderError, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Error bodies longer than this are cut before they reach logs.
const MAX_ERROR_BODY: usize = 500;

pub type Result<T> = std::result::Result<T, ProviderError>;

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, model, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Reads `OPENAI_API_KEY`, and `OPENAI_MODEL` if set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ProviderError::MissingCredential)?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(api_key, model)
    }

    /// Point at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn chat_request<'a>(model: &'a str, request: &'a GenerationRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [ChatMessage {
            role: "user",
            content: &request.prompt,
        }],
        temperature: request.options.temperature,
        max_tokens: request.options.max_tokens,
        response_format: request
            .options
            .structured_output
            .then_some(ResponseFormat { kind: "json_object" }),
    }
}

/// First choice's content, trimmed.
fn extract_content(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|err| ProviderError::malformed(err.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| ProviderError::malformed("response has no message content"))
}

fn truncate_body(body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(err.to_string())
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    #[instrument(skip_all, fields(model = %self.model, structured = request.options.structured_output))]
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&chat_request(&self.model, request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        debug!(bytes = body.len(), "chat completion received");
        extract_content(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forumplan_core::GenerationOptions;

    fn request(options: GenerationOptions) -> GenerationRequest {
        GenerationRequest {
            prompt: "write a title".into(),
            options,
        }
    }

    #[test]
    fn blank_key_is_missing_credential() {
        assert!(matches!(
            OpenAiClient::new("  ", DEFAULT_MODEL),
            Err(ProviderError::MissingCredential)
        ));
    }

    #[test]
    fn plain_request_has_no_response_format() {
        let req = request(GenerationOptions::default());
        let value = serde_json::to_value(chat_request("gpt-3.5-turbo", &req)).unwrap();
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "write a title");
        assert_eq!(value["max_tokens"], 150);
        assert!(value.get("response_format").is_none());
    }

    #[test]
    fn structured_request_asks_for_json_object() {
        let req = request(GenerationOptions::batch());
        let value = serde_json::to_value(chat_request("m", &req)).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["max_tokens"], 2500);
    }

    #[test]
    fn content_is_trimmed() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  hello \n"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "hello");
    }

    #[test]
    fn empty_choices_are_malformed() {
        assert!(matches!(
            extract_content(r#"{"choices":[]}"#),
            Err(ProviderError::Malformed { .. })
        ));
        assert!(matches!(
            extract_content(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(ProviderError::Malformed { .. })
        ));
        assert!(matches!(
            extract_content("<html>bad gateway</html>"),
            Err(ProviderError::Malformed { .. })
        ));
    }

    #[test]
    fn long_error_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(400);
        let cut = truncate_body(body);
        assert!(cut.ends_with("..."));
        assert!(cut.len() <= MAX_ERROR_BODY + 3);
        assert_eq!(truncate_body("short".into()), "short");
    }

    #[test]
    fn base_url_is_normalized() {
        let client = OpenAiClient::new("sk-test", "m")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(client.model(), "m");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let client = OpenAiClient::with_timeout("sk-test", "m", Duration::from_secs(2))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let err = client
            .generate(&request(GenerationOptions::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Transport(_) | ProviderError::Timeout
        ));
    }
}
