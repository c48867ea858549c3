// Testing utilities and mock implementations for the domain layer
// This module is only available with the "mock" feature or in tests

// Re-export useful test mocks from the data layer
pub use nous_data::repository::tests::{MockResponseCacheRepository, MockUsageRepository};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::entities::{AiRequest, AiResponse, Complexity, ProviderStatus, ResponseSource, UsageStats};
use crate::health::{ComponentStatus, HealthComponent, HealthServiceTrait, SystemHealth};
use crate::providers::{AiProvider, Completion, CompletionRequest, ProviderError, ProviderKind, PROVIDER_TABLE};
use crate::services::optimizer::{prompt_hash, AiServiceError, AiServiceTrait};

/// Mock implementation of the AiServiceTrait for testing
///
/// Echoes every prompt back and counts calls.
#[derive(Debug, Default)]
pub struct MockAiService {
    generate_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
    should_fail_generate: bool,
    should_fail_cleanup: bool,
}

impl MockAiService {
    /// Create a new mock AI service
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail every generate call
    pub fn with_generate_failure(mut self) -> Self {
        self.should_fail_generate = true;
        self
    }

    /// Configure the mock to fail every cache cleanup
    pub fn with_cleanup_failure(mut self) -> Self {
        self.should_fail_cleanup = true;
        self
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn cleanup_calls(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiServiceTrait for MockAiService {
    async fn generate(&self, request: AiRequest) -> Result<AiResponse, AiServiceError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);

        if self.should_fail_generate {
            return Err(AiServiceError::Internal("mock is configured to fail generation".to_string()));
        }
        if request.prompt.trim().is_empty() {
            return Err(AiServiceError::Validation("prompt: Prompt must not be blank".to_string()));
        }

        Ok(AiResponse {
            text: format!("echo: {}", request.prompt.trim()),
            source: ResponseSource::Provider,
            provider: "mock".to_string(),
            model: Some("mock-model".to_string()),
            complexity: request.complexity.unwrap_or(Complexity::Simple),
            cost: 0.0,
            tokens: 0,
            cached: false,
            degraded: false,
            prompt_hash: prompt_hash(&request.prompt),
            answered_at: Utc::now(),
        })
    }

    async fn usage_stats(&self) -> Result<UsageStats, AiServiceError> {
        let total = self.generate_calls() as u64;
        Ok(UsageStats {
            total_requests: total,
            cache_hits: 0,
            local_responses: 0,
            provider_responses: total,
            cache_hit_rate: 0.0,
            total_cost: 0.0,
            saved_cost: 0.0,
            cache_entries: 0,
            by_provider: vec![],
            generated_at: Utc::now(),
        })
    }

    async fn provider_status(&self) -> Result<Vec<ProviderStatus>, AiServiceError> {
        Ok(PROVIDER_TABLE
            .iter()
            .map(|spec| ProviderStatus {
                provider: spec.kind.name().to_string(),
                configured: false,
                free_tier: spec.free_tier,
                cost_per_1k_tokens: spec.cost_per_1k_tokens,
                max_complexity: spec.max_complexity,
                daily_used: 0,
                daily_limit: spec.daily_limit,
                monthly_used: 0,
                monthly_limit: spec.monthly_limit,
                remaining_today: spec.daily_limit,
                available: false,
            })
            .collect())
    }

    async fn cleanup_cache(&self) -> Result<usize, AiServiceError> {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_cleanup {
            Err(AiServiceError::Internal("mock is configured to fail cleanup".to_string()))
        } else {
            Ok(0)
        }
    }
}

/// Provider that always answers with the same text and counts its calls
#[derive(Debug, Clone)]
pub struct StaticProvider {
    kind: ProviderKind,
    answer: String,
    calls: Arc<AtomicUsize>,
}

impl StaticProvider {
    pub fn new(kind: ProviderKind, answer: impl Into<String>) -> Self {
        Self {
            kind,
            answer: answer.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiProvider for StaticProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Completion {
            text: self.answer.clone(),
            model: request.model.clone(),
            prompt_tokens: None,
            completion_tokens: None,
        })
    }
}

/// Mock implementation of the HealthServiceTrait for testing
#[derive(Debug)]
pub struct MockHealthService {
    database: ComponentStatus,
}

impl Default for MockHealthService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockHealthService {
    /// Create a mock health service that reports healthy
    pub fn new() -> Self {
        Self {
            database: ComponentStatus::Healthy,
        }
    }

    /// Configure the database status the mock reports
    pub fn with_database_status(mut self, status: ComponentStatus) -> Self {
        self.database = status;
        self
    }
}

#[async_trait]
impl HealthServiceTrait for MockHealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let mut components = HashMap::new();
        components.insert(
            "database".to_string(),
            HealthComponent {
                status: self.database,
                details: Some("Mock database".to_string()),
            },
        );
        components.insert(
            "providers".to_string(),
            HealthComponent {
                status: ComponentStatus::Healthy,
                details: None,
            },
        );
        SystemHealth::from_components(components)
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        match self.database {
            ComponentStatus::Healthy => Ok(true),
            ComponentStatus::Degraded => Ok(false),
            ComponentStatus::Unhealthy => Err("Mock database is unavailable".to_string()),
        }
    }
}
