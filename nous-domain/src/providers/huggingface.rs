//! HuggingFace Inference API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{non_empty, send_json};
use super::{AiProvider, Completion, CompletionRequest, ProviderError, ProviderKind};

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HuggingFaceProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl HuggingFaceProvider {
    pub fn new(client: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AiProvider for HuggingFaceProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        // Model ids contain a slash and are used verbatim in the path
        let url = format!("{}/models/{}", self.base_url, request.model);
        debug!("Calling huggingface model {}", request.model);

        let body = InferenceRequest {
            inputs: &request.prompt,
            parameters: InferenceParameters {
                max_new_tokens: request.max_tokens,
                return_full_text: false,
            },
        };

        let builder = self.client.post(url).bearer_auth(&self.api_key).json(&body);
        let generations: Vec<Generation> = send_json(builder, &request.model).await?;
        let text = non_empty(
            generations.into_iter().next().and_then(|g| g.generated_text),
            &request.model,
        )?;

        Ok(Completion {
            text,
            model: request.model.clone(),
            prompt_tokens: None,
            completion_tokens: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_server;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn infer(Path((org, name)): Path<(String, String)>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        if name == "loading" {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Model is currently loading", "estimated_time": 20.0 })),
            );
        }
        assert_eq!(body["parameters"]["return_full_text"], json!(false));
        let reply = format!("{}/{} says hi to {}", org, name, body["inputs"].as_str().unwrap_or(""));
        (StatusCode::OK, Json(json!([{ "generated_text": reply }])))
    }

    async fn provider() -> HuggingFaceProvider {
        let base = test_server::spawn(Router::new().route("/models/:org/:name", post(infer))).await;
        HuggingFaceProvider::new(Client::new(), "hf-key", base)
    }

    #[tokio::test]
    async fn test_generated_text_is_returned() {
        let provider = provider().await;
        let completion = provider
            .complete(&CompletionRequest {
                model: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
                prompt: "bob".to_string(),
                max_tokens: 32,
            })
            .await
            .unwrap();

        assert_eq!(completion.text, "mistralai/Mistral-7B-Instruct-v0.2 says hi to bob");
        assert_eq!(completion.reported_tokens(), None);
    }

    #[tokio::test]
    async fn test_loading_model_is_retryable_server_error() {
        let provider = provider().await;
        let err = provider
            .complete(&CompletionRequest {
                model: "org/loading".to_string(),
                prompt: "bob".to_string(),
                max_tokens: 32,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Server { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
