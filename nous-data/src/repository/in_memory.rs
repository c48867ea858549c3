use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::models::{CacheStats, CachedResponse, NewCachedResponse, ProviderUsageSummary, UsageRecord, UsageSummary};
use super::errors::RepositoryError;

/// In-memory storage used when the database is not available
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    cache: Arc<Mutex<HashMap<String, CachedResponse>>>,
    usage: Arc<Mutex<Vec<UsageRecord>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_cached(&self, prompt_hash: &str, fresh_since: &str) -> Result<Option<CachedResponse>, RepositoryError> {
        let cache = self.cache.lock()?;
        Ok(cache
            .get(prompt_hash)
            .filter(|entry| entry.created_at.as_str() >= fresh_since)
            .cloned())
    }

    pub fn upsert_cached(&self, entry: &NewCachedResponse, now: &str) -> Result<(), RepositoryError> {
        let mut cache = self.cache.lock()?;
        cache.insert(
            entry.prompt_hash.clone(),
            CachedResponse {
                prompt_hash: entry.prompt_hash.clone(),
                prompt: entry.prompt.clone(),
                response: entry.response.clone(),
                provider: entry.provider.clone(),
                model: entry.model.clone(),
                complexity: entry.complexity.clone(),
                cost: entry.cost,
                hit_count: 0,
                created_at: now.to_string(),
                last_accessed: now.to_string(),
            },
        );
        Ok(())
    }

    pub fn record_cache_hit(&self, prompt_hash: &str, now: &str) -> Result<(), RepositoryError> {
        let mut cache = self.cache.lock()?;
        if let Some(entry) = cache.get_mut(prompt_hash) {
            entry.hit_count += 1;
            entry.last_accessed = now.to_string();
        }
        Ok(())
    }

    pub fn delete_cached_before(&self, cutoff: &str) -> Result<usize, RepositoryError> {
        let mut cache = self.cache.lock()?;
        let before = cache.len();
        cache.retain(|_, entry| entry.created_at.as_str() >= cutoff);
        Ok(before - cache.len())
    }

    pub fn cache_stats(&self) -> Result<CacheStats, RepositoryError> {
        let cache = self.cache.lock()?;
        Ok(CacheStats {
            entries: cache.len() as u64,
            total_hits: cache.values().map(|entry| entry.hit_count as u64).sum(),
        })
    }

    pub fn insert_usage(&self, record: &UsageRecord) -> Result<(), RepositoryError> {
        let mut usage = self.usage.lock()?;
        usage.push(record.clone());
        Ok(())
    }

    pub fn count_provider_requests(&self, provider: &str, since: &str) -> Result<u64, RepositoryError> {
        let usage = self.usage.lock()?;
        Ok(usage
            .iter()
            .filter(|r| r.provider == provider && !r.cache_hit && r.created_at.as_str() >= since)
            .count() as u64)
    }

    pub fn usage_summary(&self, since: Option<&str>) -> Result<UsageSummary, RepositoryError> {
        let usage = self.usage.lock()?;
        let since = since.unwrap_or("");

        let mut summary = UsageSummary::default();
        let mut by_provider: BTreeMap<String, ProviderUsageSummary> = BTreeMap::new();

        for record in usage.iter().filter(|r| r.created_at.as_str() >= since) {
            summary.total_requests += 1;
            if record.cache_hit {
                summary.cache_hits += 1;
            }
            summary.total_cost += record.cost;
            summary.saved_cost += record.saved_cost;

            let entry = by_provider
                .entry(record.provider.clone())
                .or_insert_with(|| ProviderUsageSummary {
                    provider: record.provider.clone(),
                    requests: 0,
                    tokens: 0,
                    cost: 0.0,
                });
            entry.requests += 1;
            entry.tokens += record.tokens as u64;
            entry.cost += record.cost;
        }

        summary.by_provider = by_provider.into_values().collect();
        Ok(summary)
    }
}
