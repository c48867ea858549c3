//! Cost-optimized AI request routing
//!
//! Each prompt is answered by the cheapest source that can: the response
//! cache, then free-tier providers, then paid providers, then canned
//! templates, and finally a generic degraded reply. Cache and usage-log
//! failures are logged and never fail a request.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use validator::Validate;

use nous_data::database::DatabasePool;
use nous_data::models::{NewCachedResponse, NewUsageRecord};
use nous_data::repository::{
    RepositoryError, ResponseCacheRepository, ResponseCacheRepositoryTrait, UsageRepository, UsageRepositoryTrait,
};

use crate::config::{clamp_cache_windows, OptimizerConfig};
use crate::entities::ai::MAX_PROMPT_CHARS;
use crate::entities::conversions;
use crate::entities::{AiRequest, AiResponse, Complexity, ProviderStatus, ResponseSource, UsageStats};
use crate::providers::{build_providers, estimate_cost, estimate_tokens, AiProvider, ProviderKind, PROVIDER_TABLE};
use crate::services::complexity::classify_complexity;
use crate::services::retry::{complete_with_fallback, RetryPolicy};
use crate::services::selector::{quota_usage, select_providers};
use crate::services::templates::{fallback_response, TemplateResponder};

/// Usage-log provider names for answers that did not come from a provider
pub const CACHE_SOURCE: &str = "cache";
pub const TEMPLATE_SOURCE: &str = "template";
pub const FALLBACK_SOURCE: &str = "fallback";

/// AI service errors
#[derive(Debug, Error)]
pub enum AiServiceError {
    /// Request failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage failed where the operation cannot degrade
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The batch worker has stopped
    #[error("Request queue is closed")]
    QueueClosed,

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Trait for AI gateway operations
#[async_trait]
pub trait AiServiceTrait: Send + Sync {
    /// Answer a prompt at the lowest available cost
    async fn generate(&self, request: AiRequest) -> Result<AiResponse, AiServiceError>;

    /// Usage and savings over the whole log
    async fn usage_stats(&self) -> Result<UsageStats, AiServiceError>;

    /// Quota status of every provider in the cost table
    async fn provider_status(&self) -> Result<Vec<ProviderStatus>, AiServiceError>;

    /// Delete cached answers past the retention window
    async fn cleanup_cache(&self) -> Result<usize, AiServiceError>;
}

/// Lowercase hex SHA-256 of the trimmed prompt
pub fn prompt_hash(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.trim().as_bytes());
    hex::encode(hasher.finalize())
}

fn validation_message(errors: validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect::<Vec<String>>()
        .join("; ")
}

/// Cost optimizer over a response cache and a usage log
pub struct CostOptimizer<C, U>
where
    C: ResponseCacheRepositoryTrait,
    U: UsageRepositoryTrait,
{
    cache: C,
    usage: U,
    providers: Vec<Arc<dyn AiProvider>>,
    templates: TemplateResponder,
    retry: RetryPolicy,
    cache_ttl: ChronoDuration,
    cache_retention: ChronoDuration,
    default_max_tokens: u32,
}

impl<C, U> CostOptimizer<C, U>
where
    C: ResponseCacheRepositoryTrait,
    U: UsageRepositoryTrait,
{
    /// Create an optimizer routing to the given provider clients
    pub fn new(cache: C, usage: U, providers: Vec<Arc<dyn AiProvider>>, config: &OptimizerConfig) -> Self {
        let (ttl_days, retention_days) = clamp_cache_windows(config.cache_ttl_days, config.cache_retention_days);
        Self {
            cache,
            usage,
            providers,
            templates: TemplateResponder::new(),
            retry: RetryPolicy {
                max_attempts: config.retry_max_attempts,
                base_delay: config.retry_base_delay,
                ..RetryPolicy::default()
            },
            cache_ttl: ChronoDuration::days(ttl_days),
            cache_retention: ChronoDuration::days(retention_days),
            default_max_tokens: config.default_max_tokens,
        }
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Providers that have a client
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        self.providers.iter().map(|p| p.kind()).collect()
    }

    fn provider(&self, kind: ProviderKind) -> Option<&Arc<dyn AiProvider>> {
        self.providers.iter().find(|p| p.kind() == kind)
    }

    fn validate_request(&self, request: &AiRequest) -> Result<(), AiServiceError> {
        if let Err(errors) = request.validate() {
            return Err(AiServiceError::Validation(validation_message(errors)));
        }

        let trimmed = request.prompt.trim();
        if trimmed.is_empty() {
            return Err(AiServiceError::Validation("prompt: Prompt must not be blank".to_string()));
        }
        if trimmed.chars().count() as u64 > MAX_PROMPT_CHARS {
            return Err(AiServiceError::Validation(format!(
                "prompt: Prompt must be at most {} characters",
                MAX_PROMPT_CHARS
            )));
        }
        Ok(())
    }

    async fn log_usage(&self, record: NewUsageRecord, at: DateTime<Utc>) {
        let provider = record.provider.clone();
        if let Err(e) = self.usage.record(record, at).await {
            error!("Failed to log usage for {}: {}", provider, e);
        }
    }

    async fn lookup_cache(&self, hash: &str, now: DateTime<Utc>) -> Option<nous_data::models::CachedResponse> {
        let fresh_since = now.checked_sub_signed(self.cache_ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);
        match self.cache.get_fresh(hash, fresh_since).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Response cache lookup failed, treating as a miss: {}", e);
                None
            }
        }
    }

    async fn answer_from_providers(
        &self,
        prompt: &str,
        hash: &str,
        complexity: Complexity,
        max_tokens: u32,
        now: DateTime<Utc>,
    ) -> Option<AiResponse> {
        let candidates = select_providers(&self.usage, complexity, &self.configured_providers(), now).await;
        if candidates.is_empty() {
            debug!("No provider available for {} prompt", complexity);
        }

        for spec in candidates {
            let Some(provider) = self.provider(spec.kind) else {
                continue;
            };

            let completion =
                match complete_with_fallback(provider.as_ref(), spec.models, prompt, max_tokens, &self.retry).await {
                    Ok(completion) => completion,
                    Err(e) => {
                        warn!("Provider {} failed, trying the next one: {}", spec.kind, e);
                        continue;
                    }
                };

            let tokens = completion
                .reported_tokens()
                .unwrap_or_else(|| estimate_tokens(prompt) + estimate_tokens(&completion.text));
            let cost = estimate_cost(spec, tokens);
            info!(
                "Answered by {} ({}), tokens={}, cost=${:.6}",
                spec.kind, completion.model, tokens, cost
            );

            let entry = NewCachedResponse {
                prompt_hash: hash.to_string(),
                prompt: prompt.to_string(),
                response: completion.text.clone(),
                provider: spec.kind.name().to_string(),
                model: completion.model.clone(),
                complexity: complexity.as_str().to_string(),
                cost,
            };
            if let Err(e) = self.cache.store(entry, now).await {
                error!("Failed to cache response: {}", e);
            }

            self.log_usage(
                NewUsageRecord {
                    provider: spec.kind.name().to_string(),
                    model: Some(completion.model.clone()),
                    complexity: complexity.as_str().to_string(),
                    prompt_hash: hash.to_string(),
                    tokens,
                    cost,
                    saved_cost: 0.0,
                    cache_hit: false,
                },
                now,
            )
            .await;

            return Some(AiResponse {
                text: completion.text,
                source: ResponseSource::Provider,
                provider: spec.kind.name().to_string(),
                model: Some(completion.model),
                complexity,
                cost,
                tokens,
                cached: false,
                degraded: false,
                prompt_hash: hash.to_string(),
                answered_at: now,
            });
        }

        None
    }
}

#[async_trait]
impl<C, U> AiServiceTrait for CostOptimizer<C, U>
where
    C: ResponseCacheRepositoryTrait,
    U: UsageRepositoryTrait,
{
    async fn generate(&self, request: AiRequest) -> Result<AiResponse, AiServiceError> {
        self.validate_request(&request)?;

        let now = Utc::now();
        let prompt = request.prompt.trim();
        let hash = prompt_hash(prompt);
        let complexity = request.complexity.unwrap_or_else(|| classify_complexity(prompt));
        let max_tokens = request.max_tokens.unwrap_or(self.default_max_tokens);

        if let Some(entry) = self.lookup_cache(&hash, now).await {
            debug!("Cache hit for prompt {}", hash);
            if let Err(e) = self.cache.record_hit(&hash, now).await {
                error!("Failed to record cache hit: {}", e);
            }

            self.log_usage(
                NewUsageRecord {
                    provider: CACHE_SOURCE.to_string(),
                    model: Some(entry.model.clone()),
                    complexity: complexity.as_str().to_string(),
                    prompt_hash: hash.clone(),
                    tokens: 0,
                    cost: 0.0,
                    saved_cost: entry.cost,
                    cache_hit: true,
                },
                now,
            )
            .await;

            return Ok(conversions::convert_to_domain_cached_response(entry, complexity, now));
        }

        if let Some(response) = self.answer_from_providers(prompt, &hash, complexity, max_tokens, now).await {
            return Ok(response);
        }

        let (source, text, degraded) = match self.templates.respond(prompt, complexity) {
            Some(template) => {
                debug!("Answering from template category {}", template.category);
                (ResponseSource::Template, template.text, false)
            }
            None => {
                warn!("No provider or template could answer, serving fallback");
                (ResponseSource::Fallback, fallback_response(), true)
            }
        };
        let provider = match source {
            ResponseSource::Template => TEMPLATE_SOURCE,
            _ => FALLBACK_SOURCE,
        };

        self.log_usage(
            NewUsageRecord {
                provider: provider.to_string(),
                model: None,
                complexity: complexity.as_str().to_string(),
                prompt_hash: hash.clone(),
                tokens: 0,
                cost: 0.0,
                saved_cost: 0.0,
                cache_hit: false,
            },
            now,
        )
        .await;

        Ok(AiResponse {
            text: text.to_string(),
            source,
            provider: provider.to_string(),
            model: None,
            complexity,
            cost: 0.0,
            tokens: 0,
            cached: false,
            degraded,
            prompt_hash: hash,
            answered_at: now,
        })
    }

    async fn usage_stats(&self) -> Result<UsageStats, AiServiceError> {
        let summary = self.usage.summary(None).await?;
        let cache = self.cache.stats().await?;

        let local_responses: u64 = summary
            .by_provider
            .iter()
            .filter(|p| p.provider == TEMPLATE_SOURCE || p.provider == FALLBACK_SOURCE)
            .map(|p| p.requests)
            .sum();
        let provider_responses = summary
            .total_requests
            .saturating_sub(summary.cache_hits)
            .saturating_sub(local_responses);
        let cache_hit_rate = if summary.total_requests == 0 {
            0.0
        } else {
            summary.cache_hits as f64 / summary.total_requests as f64
        };

        Ok(UsageStats {
            total_requests: summary.total_requests,
            cache_hits: summary.cache_hits,
            local_responses,
            provider_responses,
            cache_hit_rate,
            total_cost: summary.total_cost,
            saved_cost: summary.saved_cost,
            cache_entries: cache.entries,
            by_provider: summary
                .by_provider
                .into_iter()
                .map(conversions::convert_to_domain_provider_usage)
                .collect(),
            generated_at: Utc::now(),
        })
    }

    async fn provider_status(&self) -> Result<Vec<ProviderStatus>, AiServiceError> {
        let now = Utc::now();
        let mut statuses = Vec::with_capacity(PROVIDER_TABLE.len());

        for spec in PROVIDER_TABLE.iter() {
            let used = quota_usage(&self.usage, spec.kind, now).await?;
            let configured = self.provider(spec.kind).is_some();

            statuses.push(ProviderStatus {
                provider: spec.kind.name().to_string(),
                configured,
                free_tier: spec.free_tier,
                cost_per_1k_tokens: spec.cost_per_1k_tokens,
                max_complexity: spec.max_complexity,
                daily_used: used.daily,
                daily_limit: spec.daily_limit,
                monthly_used: used.monthly,
                monthly_limit: spec.monthly_limit,
                remaining_today: spec.daily_limit.saturating_sub(used.daily),
                available: configured && crate::services::selector::has_quota(spec, used.daily, used.monthly),
            });
        }

        Ok(statuses)
    }

    async fn cleanup_cache(&self) -> Result<usize, AiServiceError> {
        let cutoff = Utc::now()
            .checked_sub_signed(self.cache_retention)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let deleted = self.cache.delete_older_than(cutoff).await?;
        info!("Cache cleanup removed {} entries older than {}", deleted, cutoff);
        Ok(deleted)
    }
}

/// Create the production AI service
///
/// Uses SQLite repositories over `pool`, or in-memory repositories when no
/// pool is available, and a client for every configured provider.
pub fn create_default_ai_service(
    pool: Option<DatabasePool>,
    config: &OptimizerConfig,
) -> Result<CostOptimizer<ResponseCacheRepository, UsageRepository>, AiServiceError> {
    let (cache, usage) = match pool {
        Some(pool) => (ResponseCacheRepository::new(pool.clone()), UsageRepository::new(pool)),
        None => {
            warn!("No database pool, the response cache and usage log will not persist");
            (ResponseCacheRepository::in_memory(), UsageRepository::in_memory())
        }
    };

    let providers = build_providers(&config.providers, config.request_timeout)
        .map_err(|e| AiServiceError::Internal(e.to_string()))?;
    if providers.is_empty() {
        warn!("No AI provider API keys configured, only templates will answer");
    }

    Ok(CostOptimizer::new(cache, usage, providers, config))
}
