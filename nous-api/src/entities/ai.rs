use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::common::ErrorResponse;

/// Coarse difficulty label used to route a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Request payload for answering a prompt
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    /// Prompt text
    #[validate(length(min = 1, max = 8000, message = "Prompt must be between 1 and 8000 characters"))]
    #[schema(example = "What is the capital of France?")]
    pub prompt: String,

    /// Complexity label; classified from the prompt when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,

    /// Upper bound on generated tokens (default: 512)
    #[validate(range(min = 1, max = 4096, message = "max_tokens must be between 1 and 4096"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(minimum = 1, maximum = 4096)]
    pub max_tokens: Option<u32>,
}

/// An answered prompt
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    /// Answer text
    pub text: String,

    /// Where the answer came from: cache, provider, template or fallback
    pub source: String,

    /// Provider that produced the text
    pub provider: String,

    /// Model that produced the text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Complexity the prompt was routed with
    pub complexity: Complexity,

    /// Cost of this request in USD
    pub cost: f64,

    /// Tokens consumed by this request
    pub tokens: u32,

    /// Whether the answer was served from cache
    pub cached: bool,

    /// Whether the answer is a degraded fallback
    pub degraded: bool,

    /// SHA-256 of the trimmed prompt
    pub prompt_hash: String,

    /// When the answer was produced
    pub answered_at: DateTime<Utc>,
}

/// Request payload for answering several prompts
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct BatchRequest {
    /// Prompts to answer (1 to 50)
    #[validate(length(min = 1, max = 50, message = "A batch must contain between 1 and 50 requests"))]
    pub requests: Vec<ChatRequest>,
}

/// Outcome of one prompt in a batch
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchItemResult {
    /// Position of the prompt in the request
    pub index: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ChatResponse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Answers to a batch, in request order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    pub results: Vec<BatchItemResult>,
    pub succeeded: usize,
    pub failed: usize,
}

/// Usage of one provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderUsageResponse {
    /// Provider name, or cache/template/fallback
    pub provider: String,
    pub requests: u64,
    pub tokens: u64,
    /// USD spent
    pub cost: f64,
}

/// Usage and savings over the whole log
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub total_requests: u64,
    pub cache_hits: u64,
    /// Answers from templates or the generic fallback
    pub local_responses: u64,
    pub provider_responses: u64,
    pub cache_hit_rate: f64,
    /// USD spent
    pub total_cost: f64,
    /// USD saved by cache hits
    pub saved_cost: f64,
    pub cache_entries: u64,
    pub by_provider: Vec<ProviderUsageResponse>,
    pub generated_at: DateTime<Utc>,
}

/// Quota status of one provider
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderStatusResponse {
    pub provider: String,
    /// Whether an API key is configured
    pub configured: bool,
    pub free_tier: bool,
    pub cost_per_1k_tokens: f64,
    pub max_complexity: Complexity,
    pub daily_used: u64,
    pub daily_limit: u64,
    pub monthly_used: u64,
    pub monthly_limit: u64,
    pub remaining_today: u64,
    /// Configured and within both quotas
    pub available: bool,
}

/// Every provider in routing-table order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderListResponse {
    pub providers: Vec<ProviderStatusResponse>,
}

/// Result of a cache cleanup run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    /// Cache entries removed
    pub deleted: usize,
}
