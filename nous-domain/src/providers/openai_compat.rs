//! Client for OpenAI-style chat completion APIs (OpenAI and OpenRouter)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{non_empty, send_json};
use super::{AiProvider, Completion, CompletionRequest, ProviderError, ProviderKind};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessageOut<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessageOut<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageIn,
}

#[derive(Debug, Deserialize)]
struct ChatMessageIn {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

/// Chat completions client shared by every OpenAI-compatible vendor
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    kind: ProviderKind,
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(kind: ProviderKind, client: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            kind,
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatibleProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Calling {} model {}", self.kind, request.model);

        let body = ChatRequest {
            model: &request.model,
            messages: vec![ChatMessageOut {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(url).bearer_auth(&self.api_key).json(&body);
        if self.kind == ProviderKind::OpenRouter {
            builder = builder.header("X-Title", "NOUS");
        }

        let response: ChatResponse = send_json(builder, &request.model).await?;
        let text = non_empty(
            response.choices.into_iter().next().and_then(|c| c.message.content),
            &request.model,
        )?;

        Ok(Completion {
            text,
            model: request.model.clone(),
            prompt_tokens: response.usage.as_ref().and_then(|u| u.prompt_tokens),
            completion_tokens: response.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_server;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn chat(headers: HeaderMap, Json(body): Json<Value>) -> Result<Json<Value>, StatusCode> {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-key") {
            return Err(StatusCode::UNAUTHORIZED);
        }
        match body["model"].as_str() {
            Some("retired-model") => Err(StatusCode::NOT_FOUND),
            Some("busy-model") => Err(StatusCode::TOO_MANY_REQUESTS),
            Some("empty-model") => Ok(Json(json!({ "choices": [] }))),
            Some(model) => Ok(Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": format!("echo: {}", body["messages"][0]["content"].as_str().unwrap_or("")) } }],
                "usage": { "prompt_tokens": 5, "completion_tokens": 7 },
                "model": model
            }))),
            None => Err(StatusCode::BAD_REQUEST),
        }
    }

    async fn provider(api_key: &str) -> OpenAiCompatibleProvider {
        let base = test_server::spawn(Router::new().route("/v1/chat/completions", post(chat))).await;
        OpenAiCompatibleProvider::new(ProviderKind::OpenAi, Client::new(), api_key, format!("{}/v1/", base))
    }

    fn request(model: &str) -> CompletionRequest {
        CompletionRequest {
            model: model.to_string(),
            prompt: "hello there".to_string(),
            max_tokens: 64,
        }
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let provider = provider("test-key").await;
        let completion = provider.complete(&request("gpt-4o-mini")).await.unwrap();

        assert_eq!(completion.text, "echo: hello there");
        assert_eq!(completion.model, "gpt-4o-mini");
        assert_eq!(completion.reported_tokens(), Some(12));
    }

    #[tokio::test]
    async fn test_error_statuses_are_classified() {
        let provider = provider("test-key").await;

        assert_eq!(
            provider.complete(&request("retired-model")).await,
            Err(ProviderError::ModelUnavailable("retired-model".to_string()))
        );
        assert!(matches!(
            provider.complete(&request("busy-model")).await,
            Err(ProviderError::RateLimited(_))
        ));
        assert!(matches!(
            provider.complete(&request("empty-model")).await,
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_key_is_auth_error() {
        let provider = provider("wrong-key").await;
        assert!(matches!(
            provider.complete(&request("gpt-4o-mini")).await,
            Err(ProviderError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_http_error() {
        let provider = OpenAiCompatibleProvider::new(
            ProviderKind::OpenRouter,
            Client::new(),
            "test-key",
            "http://127.0.0.1:9",
        );
        let err = provider.complete(&request("gpt-4o-mini")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Http(_)));
        assert!(err.is_retryable());
    }
}
