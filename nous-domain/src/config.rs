//! Gateway configuration read from environment variables

use std::env;
use std::time::Duration;

use tracing::{info, warn};

use crate::providers::ProviderKind;

/// Credentials and endpoint for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ProviderConfig {
    /// Provider with credentials at its public endpoint
    pub fn new(kind: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            kind,
            api_key: Some(api_key.into()),
            base_url: kind.default_base_url().to_string(),
        }
    }

    /// Override the endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Whether a non-blank API key is present
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().map_or(false, |k| !k.trim().is_empty())
    }
}

/// Batch queue settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchConfig {
    /// Flush once this many requests are queued
    pub max_batch_size: usize,
    /// Flush once the oldest queued request has waited this long
    pub max_wait: Duration,
    /// Bound of the submission channel
    pub capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10,
            max_wait: Duration::from_secs(2),
            capacity: 256,
        }
    }
}

/// Cost optimizer configuration
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Cached answers younger than this are served
    pub cache_ttl_days: i64,
    /// Cached answers older than this are deleted by the cleanup job
    pub cache_retention_days: i64,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    /// Per-call HTTP timeout
    pub request_timeout: Duration,
    /// `max_tokens` used when a request does not set one
    pub default_max_tokens: u32,
    pub batch: BatchConfig,
    pub cleanup_interval: Duration,
    /// One entry per row of the provider table
    pub providers: Vec<ProviderConfig>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            cache_ttl_days: 7,
            cache_retention_days: 30,
            retry_max_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
            default_max_tokens: 512,
            batch: BatchConfig::default(),
            cleanup_interval: Duration::from_secs(86_400),
            providers: ProviderKind::ALL
                .iter()
                .map(|kind| ProviderConfig {
                    kind: *kind,
                    api_key: None,
                    base_url: kind.default_base_url().to_string(),
                })
                .collect(),
        }
    }
}

/// Longest cache TTL or retention window accepted, in days
pub const MAX_CACHE_DAYS: i64 = 3650;

/// Clamp the cache windows so the TTL is at least a day and retention
/// never drops an entry that is still fresh
pub fn clamp_cache_windows(ttl_days: i64, retention_days: i64) -> (i64, i64) {
    let ttl = ttl_days.clamp(1, MAX_CACHE_DAYS);
    (ttl, retention_days.clamp(ttl, MAX_CACHE_DAYS))
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value for {}: {:?}, using default {}", key, raw, default);
                default
            }
        },
        None => default,
    }
}

impl OptimizerConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let providers: Vec<ProviderConfig> = ProviderKind::ALL
            .iter()
            .map(|kind| {
                let prefix = kind.env_prefix();
                let api_key = lookup(&format!("{}_API_KEY", prefix)).filter(|k| !k.trim().is_empty());
                let base_url = lookup(&format!("{}_BASE_URL", prefix))
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or_else(|| kind.default_base_url().to_string());
                ProviderConfig {
                    kind: *kind,
                    api_key,
                    base_url,
                }
            })
            .collect();

        let batch = BatchConfig {
            max_batch_size: parse_or(&lookup, "NOUS_BATCH_SIZE", defaults.batch.max_batch_size).max(1),
            max_wait: Duration::from_millis(parse_or(
                &lookup,
                "NOUS_BATCH_WAIT_MS",
                defaults.batch.max_wait.as_millis() as u64,
            )),
            capacity: defaults.batch.capacity,
        };

        let (cache_ttl_days, cache_retention_days) = clamp_cache_windows(
            parse_or(&lookup, "NOUS_CACHE_TTL_DAYS", defaults.cache_ttl_days),
            parse_or(&lookup, "NOUS_CACHE_RETENTION_DAYS", defaults.cache_retention_days),
        );

        let config = Self {
            cache_ttl_days,
            cache_retention_days,
            retry_max_attempts: parse_or(&lookup, "NOUS_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts).max(1),
            retry_base_delay: Duration::from_millis(parse_or(
                &lookup,
                "NOUS_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )),
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "NOUS_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )
            .max(1)),
            default_max_tokens: parse_or(&lookup, "NOUS_DEFAULT_MAX_TOKENS", defaults.default_max_tokens).clamp(1, 4096),
            batch,
            cleanup_interval: Duration::from_secs(
                parse_or(&lookup, "NOUS_CLEANUP_INTERVAL_SECS", defaults.cleanup_interval.as_secs()).max(1),
            ),
            providers,
        };

        info!(
            "Optimizer configuration: cache_ttl={}d, retention={}d, providers configured={:?}",
            config.cache_ttl_days,
            config.cache_retention_days,
            config.configured_providers().iter().map(|k| k.name()).collect::<Vec<_>>()
        );

        config
    }

    /// Providers that have credentials
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        self.providers
            .iter()
            .filter(|p| p.is_configured())
            .map(|p| p.kind)
            .collect()
    }

    /// Set credentials for one provider
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.retain(|p| p.kind != provider.kind);
        self.providers.push(provider);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = OptimizerConfig::from_lookup(lookup(&[]));

        assert_eq!(config.cache_ttl_days, 7);
        assert_eq!(config.cache_retention_days, 30);
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.default_max_tokens, 512);
        assert_eq!(config.batch, BatchConfig::default());
        assert_eq!(config.cleanup_interval, Duration::from_secs(86_400));
        assert!(config.configured_providers().is_empty());
        assert_eq!(config.providers.len(), 4);
    }

    #[test]
    fn test_provider_keys_and_overrides() {
        let config = OptimizerConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "g-key"),
            ("OPENAI_API_KEY", "   "),
            ("OPENROUTER_API_KEY", "or-key"),
            ("OPENROUTER_BASE_URL", "http://localhost:8080/v1"),
        ]));

        assert_eq!(
            config.configured_providers(),
            vec![ProviderKind::Gemini, ProviderKind::OpenRouter]
        );
        let openrouter = config.providers.iter().find(|p| p.kind == ProviderKind::OpenRouter).unwrap();
        assert_eq!(openrouter.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = OptimizerConfig::from_lookup(lookup(&[
            ("NOUS_CACHE_TTL_DAYS", "a week"),
            ("NOUS_BATCH_SIZE", "0"),
            ("NOUS_BATCH_WAIT_MS", "250"),
            ("NOUS_DEFAULT_MAX_TOKENS", "99999"),
        ]));

        assert_eq!(config.cache_ttl_days, 7);
        assert_eq!(config.batch.max_batch_size, 1);
        assert_eq!(config.batch.max_wait, Duration::from_millis(250));
        assert_eq!(config.default_max_tokens, 4096);
    }

    #[test]
    fn test_cache_windows_are_clamped() {
        let config = OptimizerConfig::from_lookup(lookup(&[
            ("NOUS_CACHE_TTL_DAYS", "1000000000"),
            ("NOUS_CACHE_RETENTION_DAYS", "0"),
            ("NOUS_REQUEST_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(config.cache_ttl_days, MAX_CACHE_DAYS);
        assert_eq!(config.cache_retention_days, MAX_CACHE_DAYS);
        assert_eq!(config.request_timeout, Duration::from_secs(1));

        let config = OptimizerConfig::from_lookup(lookup(&[
            ("NOUS_CACHE_TTL_DAYS", "-5"),
            ("NOUS_CACHE_RETENTION_DAYS", "-5"),
        ]));
        assert_eq!(config.cache_ttl_days, 1);
        assert_eq!(config.cache_retention_days, 1);

        assert_eq!(clamp_cache_windows(14, 3), (14, 14));
        assert_eq!(clamp_cache_windows(7, 30), (7, 30));
    }

    #[test]
    fn test_with_provider_replaces_entry() {
        let config = OptimizerConfig::default()
            .with_provider(ProviderConfig::new(ProviderKind::OpenAi, "sk-test").with_base_url("http://x"));

        assert_eq!(config.providers.len(), 4);
        assert_eq!(config.configured_providers(), vec![ProviderKind::OpenAi]);
    }
}
