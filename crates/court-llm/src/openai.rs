//! OpenAI-compatible chat completions backend
//!
//! Works with any service exposing `/chat/completions` (Groq, OpenAI,
//! local gateways). One [`LanguageModel::complete`] is one HTTP request.

use crate::failure::{classify_http, ServiceFailure};
use crate::model::{ChatRequest, LanguageModel, ResponseFormat};
use serde::Deserialize;
use std::time::Duration;

/// Default endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleModel {
    /// Create a client for an endpoint
    ///
    /// # Errors
    /// Returns [`ServiceFailure::Transport`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceFailure> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceFailure::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request_body(request: &ChatRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }

        if request.images.is_empty() {
            messages.push(serde_json::json!({"role": "user", "content": request.prompt}));
        } else {
            let mut parts = vec![serde_json::json!({"type": "text", "text": request.prompt})];
            parts.extend(request.images.iter().map(|image| {
                serde_json::json!({
                    "type": "image_url",
                    "image_url": {"url": image.data_url()}
                })
            }));
            messages.push(serde_json::json!({"role": "user", "content": parts}));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
        });
        if request.format == ResponseFormat::JsonObject {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        body
    }
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiCompatibleModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ServiceFailure> {
        let api_key = self.api_key.as_deref().ok_or_else(|| ServiceFailure::Authentication {
            message: "no API key configured".to_string(),
        })?;

        let body = Self::build_request_body(request);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceFailure::Transport {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| ServiceFailure::Transport {
            message: e.to_string(),
        })?;

        if !(200..300).contains(&status) {
            return Err(classify_http(status, &body_text));
        }

        let parsed: CompletionResponse = serde_json::from_str(&body_text).map_err(|e| {
            ServiceFailure::Transport {
                message: format!("unexpected response shape: {e}"),
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ServiceFailure::Malformed {
                reason: "response carried no message content".to_string(),
                raw: None,
            })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageAttachment;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, key: Option<&str>) -> OpenAiCompatibleModel {
        OpenAiCompatibleModel::new(
            format!("{}/v1/chat/completions", server.uri()),
            key.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn body_includes_images_and_json_mode() {
        let request = ChatRequest::new("vision-model", "describe")
            .with_system("you are an analyst")
            .with_images(vec![ImageAttachment::from_bytes("image/png", b"abc")])
            .json();
        let body = OpenAiCompatibleModel::build_request_body(&request);

        assert_eq!(body["model"], "vision-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            })))
            .mount(&server)
            .await;

        let text = client(&server, Some("secret"))
            .complete(&ChatRequest::new("m", "hi"))
            .await
            .unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn rate_limit_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limit reached"))
            .mount(&server)
            .await;

        let err = client(&server, Some("k"))
            .complete(&ChatRequest::new("m", "hi"))
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_request() {
        let server = MockServer::start().await;
        let err = client(&server, None)
            .complete(&ChatRequest::new("m", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceFailure::Authentication { .. }));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
