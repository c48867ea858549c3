use chrono::{DateTime, Utc};
use nous_data::models::{CachedResponse, ProviderUsageSummary};

use crate::entities::ai::{AiResponse, Complexity, ProviderUsage, ResponseSource};

/// Conversion functions between domain entities and data models,
/// named convert_to_[target_layer]_[model_name]

/// Convert a stored cache row into the response served for a hit
///
/// A hit costs nothing and consumes no tokens. It reports the complexity
/// the current request was routed with, which is also what its usage row
/// records, not the one stored with the entry.
pub fn convert_to_domain_cached_response(
    entry: CachedResponse,
    complexity: Complexity,
    answered_at: DateTime<Utc>,
) -> AiResponse {
    AiResponse {
        text: entry.response,
        source: ResponseSource::Cache,
        provider: entry.provider,
        model: Some(entry.model),
        complexity,
        cost: 0.0,
        tokens: 0,
        cached: true,
        degraded: false,
        prompt_hash: entry.prompt_hash,
        answered_at,
    }
}

/// Convert a per-provider usage row from the data layer
pub fn convert_to_domain_provider_usage(summary: ProviderUsageSummary) -> ProviderUsage {
    ProviderUsage {
        provider: summary.provider,
        requests: summary.requests,
        tokens: summary.tokens,
        cost: summary.cost,
    }
}
