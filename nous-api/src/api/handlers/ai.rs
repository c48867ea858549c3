use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, instrument, warn};
use validator::{Validate, ValidationErrors};

use nous_domain::entities::{
    AiRequest, AiResponse, Complexity as DomainComplexity, ProviderStatus, ProviderUsage, UsageStats,
};

use crate::api::routes::AppState;
use crate::entities::ai::{
    BatchItemResult, BatchRequest, BatchResponse, ChatRequest, ChatResponse, CleanupResponse, Complexity,
    ProviderListResponse, ProviderStatusResponse, ProviderUsageResponse, UsageResponse,
};
use crate::entities::common::ErrorResponse;

/// Answer a prompt at the lowest available cost
#[utoipa::path(
    post,
    path = "/api/v1/ai/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Prompt answered", body = ChatResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "ai"
)]
#[instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ErrorResponse> {
    let Json(request) = payload.map_err(rejection_to_error)?;
    request.validate().map_err(|e| validation_failure("", &e))?;

    let response = state.ai_service.generate(convert_to_domain_request(request)).await?;
    info!(
        "Prompt answered from {} ({}), cost ${:.6}",
        response.source.as_str(),
        response.provider,
        response.cost
    );

    Ok(Json(convert_to_public_response(response)))
}

/// Answer several prompts through the batch queue
///
/// A prompt that fails does not fail the batch; its error is reported in
/// place of its answer.
#[utoipa::path(
    post,
    path = "/api/v1/ai/batch",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Batch answered", body = BatchResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 503, description = "Request queue is shutting down", body = ErrorResponse),
    ),
    tag = "ai"
)]
#[instrument(skip_all)]
pub async fn batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ErrorResponse> {
    let Json(request) = payload.map_err(rejection_to_error)?;
    request.validate().map_err(|e| validation_failure("", &e))?;
    for (index, item) in request.requests.iter().enumerate() {
        item.validate()
            .map_err(|e| validation_failure(&format!("requests[{}].", index), &e))?;
    }

    info!("Queueing batch of {} prompts", request.requests.len());
    let requests = request.requests.into_iter().map(convert_to_domain_request).collect();
    let answers = state.batch_queue.submit_all(requests).await;

    let results: Vec<BatchItemResult> = answers
        .into_iter()
        .enumerate()
        .map(|(index, answer)| match answer {
            Ok(response) => BatchItemResult {
                index,
                response: Some(convert_to_public_response(response)),
                error: None,
            },
            Err(e) => {
                warn!("Batch item {} failed: {}", index, e);
                BatchItemResult {
                    index,
                    response: None,
                    error: Some(ErrorResponse::from(e)),
                }
            }
        })
        .collect();

    let succeeded = results.iter().filter(|r| r.response.is_some()).count();
    let failed = results.len() - succeeded;

    Ok(Json(BatchResponse {
        results,
        succeeded,
        failed,
    }))
}

/// Usage and savings statistics
#[utoipa::path(
    get,
    path = "/api/v1/ai/usage",
    responses(
        (status = 200, description = "Usage statistics", body = UsageResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "ai"
)]
#[instrument(skip(state))]
pub async fn usage(State(state): State<AppState>) -> Result<Json<UsageResponse>, ErrorResponse> {
    let stats = state.ai_service.usage_stats().await?;
    Ok(Json(convert_to_public_usage(stats)))
}

/// Quota status of every provider
#[utoipa::path(
    get,
    path = "/api/v1/ai/providers",
    responses(
        (status = 200, description = "Provider status", body = ProviderListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "ai"
)]
#[instrument(skip(state))]
pub async fn providers(State(state): State<AppState>) -> Result<Json<ProviderListResponse>, ErrorResponse> {
    let providers = state
        .ai_service
        .provider_status()
        .await?
        .into_iter()
        .map(convert_to_public_provider_status)
        .collect();

    Ok(Json(ProviderListResponse { providers }))
}

/// Delete cached answers past the retention window
#[utoipa::path(
    post,
    path = "/api/v1/ai/cache/cleanup",
    responses(
        (status = 200, description = "Cleanup finished", body = CleanupResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "ai"
)]
#[instrument(skip(state))]
pub async fn cleanup_cache(State(state): State<AppState>) -> Result<impl IntoResponse, ErrorResponse> {
    let deleted = state.ai_service.cleanup_cache().await?;
    info!("Manual cache cleanup deleted {} entries", deleted);
    Ok((StatusCode::OK, Json(CleanupResponse { deleted })))
}

fn rejection_to_error(rejection: JsonRejection) -> ErrorResponse {
    warn!("Rejected request body: {}", rejection.body_text());
    ErrorResponse::bad_request(&rejection.body_text())
}

/// Flatten validator errors into one message, prefixing each field
fn validation_failure(prefix: &str, errors: &ValidationErrors) -> ErrorResponse {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}{}: {}", prefix, field, message)
            })
        })
        .collect();
    messages.sort();

    warn!("Request validation failed: {}", messages.join(", "));
    ErrorResponse::validation_error(&messages.join(", "), serde_json::to_value(errors).ok())
}

fn convert_to_domain_complexity(complexity: Complexity) -> DomainComplexity {
    match complexity {
        Complexity::Simple => DomainComplexity::Simple,
        Complexity::Moderate => DomainComplexity::Moderate,
        Complexity::Complex => DomainComplexity::Complex,
    }
}

fn convert_to_public_complexity(complexity: DomainComplexity) -> Complexity {
    match complexity {
        DomainComplexity::Simple => Complexity::Simple,
        DomainComplexity::Moderate => Complexity::Moderate,
        DomainComplexity::Complex => Complexity::Complex,
    }
}

fn convert_to_domain_request(request: ChatRequest) -> AiRequest {
    AiRequest {
        prompt: request.prompt,
        complexity: request.complexity.map(convert_to_domain_complexity),
        max_tokens: request.max_tokens,
    }
}

fn convert_to_public_response(response: AiResponse) -> ChatResponse {
    ChatResponse {
        text: response.text,
        source: response.source.as_str().to_string(),
        provider: response.provider,
        model: response.model,
        complexity: convert_to_public_complexity(response.complexity),
        cost: response.cost,
        tokens: response.tokens,
        cached: response.cached,
        degraded: response.degraded,
        prompt_hash: response.prompt_hash,
        answered_at: response.answered_at,
    }
}

fn convert_to_public_provider_usage(usage: ProviderUsage) -> ProviderUsageResponse {
    ProviderUsageResponse {
        provider: usage.provider,
        requests: usage.requests,
        tokens: usage.tokens,
        cost: usage.cost,
    }
}

fn convert_to_public_usage(stats: UsageStats) -> UsageResponse {
    UsageResponse {
        total_requests: stats.total_requests,
        cache_hits: stats.cache_hits,
        local_responses: stats.local_responses,
        provider_responses: stats.provider_responses,
        cache_hit_rate: stats.cache_hit_rate,
        total_cost: stats.total_cost,
        saved_cost: stats.saved_cost,
        cache_entries: stats.cache_entries,
        by_provider: stats
            .by_provider
            .into_iter()
            .map(convert_to_public_provider_usage)
            .collect(),
        generated_at: stats.generated_at,
    }
}

fn convert_to_public_provider_status(status: ProviderStatus) -> ProviderStatusResponse {
    ProviderStatusResponse {
        provider: status.provider,
        configured: status.configured,
        free_tier: status.free_tier,
        cost_per_1k_tokens: status.cost_per_1k_tokens,
        max_complexity: convert_to_public_complexity(status.max_complexity),
        daily_used: status.daily_used,
        daily_limit: status.daily_limit,
        monthly_used: status.monthly_used,
        monthly_limit: status.monthly_limit,
        remaining_today: status.remaining_today,
        available: status.available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use nous_domain::config::BatchConfig;
    use nous_domain::services::{AiServiceTrait, BatchQueue};
    use nous_domain::testing::MockAiService;

    fn state_with(service: Arc<MockAiService>) -> AppState {
        let ai_service: Arc<dyn AiServiceTrait> = service;
        let batch_queue = BatchQueue::spawn(
            ai_service.clone(),
            BatchConfig {
                max_batch_size: 5,
                max_wait: Duration::from_millis(20),
                capacity: 16,
            },
        );
        AppState {
            ai_service,
            batch_queue,
        }
    }

    fn chat_request(prompt: &str) -> ChatRequest {
        ChatRequest {
            prompt: prompt.to_string(),
            complexity: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_chat_returns_service_answer() {
        let service = Arc::new(MockAiService::new());
        let state = state_with(service.clone());

        let Json(response) = chat(State(state), Ok(Json(chat_request("hello there"))))
            .await
            .unwrap();

        assert_eq!(response.text, "echo: hello there");
        assert_eq!(response.source, "provider");
        assert_eq!(service.generate_calls(), 1);
    }

    #[tokio::test]
    async fn test_chat_rejects_invalid_max_tokens_before_the_service() {
        let service = Arc::new(MockAiService::new());
        let state = state_with(service.clone());

        let mut request = chat_request("hello");
        request.max_tokens = Some(0);
        let error = chat(State(state), Ok(Json(request))).await.unwrap_err();

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.message.starts_with("max_tokens:"));
        assert_eq!(service.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_chat_hides_internal_errors() {
        let state = state_with(Arc::new(MockAiService::new().with_generate_failure()));

        let error = chat(State(state), Ok(Json(chat_request("hello")))).await.unwrap_err();

        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.error, "internal_error");
    }

    #[tokio::test]
    async fn test_batch_reports_item_errors_in_place() {
        let state = state_with(Arc::new(MockAiService::new()));
        let request = BatchRequest {
            requests: vec![chat_request("first"), chat_request("   "), chat_request("third")],
        };

        let Json(response) = batch(State(state), Ok(Json(request))).await.unwrap();

        assert_eq!(response.succeeded, 2);
        assert_eq!(response.failed, 1);
        assert_eq!(response.results[0].response.as_ref().unwrap().text, "echo: first");
        assert_eq!(response.results[1].error.as_ref().unwrap().error, "validation_error");
        assert_eq!(response.results[2].index, 2);
    }

    #[tokio::test]
    async fn test_batch_rejects_invalid_item_with_its_index() {
        let state = state_with(Arc::new(MockAiService::new()));
        let mut bad = chat_request("second");
        bad.max_tokens = Some(10_000);
        let request = BatchRequest {
            requests: vec![chat_request("first"), bad],
        };

        let error = batch(State(state), Ok(Json(request))).await.unwrap_err();

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
        assert!(error.message.starts_with("requests[1].max_tokens"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let state = state_with(Arc::new(MockAiService::new()));

        let error = batch(State(state), Ok(Json(BatchRequest { requests: vec![] })))
            .await
            .unwrap_err();

        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_providers_lists_the_whole_table() {
        let state = state_with(Arc::new(MockAiService::new()));

        let Json(list) = providers(State(state)).await.unwrap();

        let names: Vec<&str> = list.providers.iter().map(|p| p.provider.as_str()).collect();
        assert_eq!(names, vec!["huggingface", "gemini", "openrouter", "openai"]);
        assert!(list.providers.iter().all(|p| !p.available));
    }

    #[tokio::test]
    async fn test_cleanup_failure_is_internal_error() {
        let state = state_with(Arc::new(MockAiService::new().with_cleanup_failure()));

        let result = cleanup_cache(State(state)).await;

        assert_eq!(result.err().map(|e| e.status()), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_complexity_conversions_agree() {
        for complexity in [Complexity::Simple, Complexity::Moderate, Complexity::Complex] {
            assert_eq!(
                convert_to_public_complexity(convert_to_domain_complexity(complexity)),
                complexity
            );
        }
    }
}
