use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::database::DatabasePool;
use crate::models::{format_timestamp, CacheStats, CachedResponse, NewCachedResponse};
use super::errors::RepositoryError;
use super::in_memory::InMemoryStorage;
use super::storage::DatabaseStorage;

/// Repository trait for the AI response cache
#[async_trait]
pub trait ResponseCacheRepositoryTrait: Send + Sync {
    /// Get a cached response written at or after `fresh_since`
    async fn get_fresh(
        &self,
        prompt_hash: &str,
        fresh_since: DateTime<Utc>,
    ) -> Result<Option<CachedResponse>, RepositoryError>;

    /// Insert or replace a cached response
    async fn store(&self, entry: NewCachedResponse, created_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Record that a cached response was served
    async fn record_hit(&self, prompt_hash: &str, accessed_at: DateTime<Utc>) -> Result<(), RepositoryError>;

    /// Delete entries written before `cutoff`, returning how many were removed
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError>;

    /// Entry and hit counts
    async fn stats(&self) -> Result<CacheStats, RepositoryError>;
}

/// Response cache backed by SQLite, with in-memory storage when the
/// database is missing or failing
#[derive(Debug, Clone, Default)]
pub struct ResponseCacheRepository {
    pool: Option<DatabasePool>,
    storage: InMemoryStorage,
}

impl ResponseCacheRepository {
    /// Create a repository over a database pool
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool: Some(pool),
            storage: InMemoryStorage::new(),
        }
    }

    /// Create a repository that never touches a database
    pub fn in_memory() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseCacheRepositoryTrait for ResponseCacheRepository {
    async fn get_fresh(
        &self,
        prompt_hash: &str,
        fresh_since: DateTime<Utc>,
    ) -> Result<Option<CachedResponse>, RepositoryError> {
        let fresh_since = format_timestamp(&fresh_since);
        match &self.pool {
            Some(pool) => match DatabaseStorage::get_cached(pool, prompt_hash, &fresh_since) {
                Ok(entry) => Ok(entry),
                Err(e) => {
                    error!("Failed to read response cache from database: {}", e);
                    self.storage.get_cached(prompt_hash, &fresh_since)
                }
            },
            None => {
                debug!("Database not available, using in-memory response cache");
                self.storage.get_cached(prompt_hash, &fresh_since)
            }
        }
    }

    async fn store(&self, entry: NewCachedResponse, created_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let now = format_timestamp(&created_at);
        match &self.pool {
            Some(pool) => match DatabaseStorage::upsert_cached(pool, &entry, &now) {
                Ok(()) => Ok(()),
                Err(e) => {
                    error!("Failed to store cached response in database: {}", e);
                    self.storage.upsert_cached(&entry, &now)
                }
            },
            None => self.storage.upsert_cached(&entry, &now),
        }
    }

    async fn record_hit(&self, prompt_hash: &str, accessed_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let now = format_timestamp(&accessed_at);
        match &self.pool {
            Some(pool) => DatabaseStorage::record_cache_hit(pool, prompt_hash, &now)
                .or_else(|e| {
                    error!("Failed to record cache hit in database: {}", e);
                    self.storage.record_cache_hit(prompt_hash, &now)
                }),
            None => self.storage.record_cache_hit(prompt_hash, &now),
        }
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let cutoff = format_timestamp(&cutoff);

        // In-memory entries exist only after a database failure; prune both
        let from_memory = self.storage.delete_cached_before(&cutoff)?;
        match &self.pool {
            Some(pool) => Ok(DatabaseStorage::delete_cached_before(pool, &cutoff)? + from_memory),
            None => Ok(from_memory),
        }
    }

    async fn stats(&self) -> Result<CacheStats, RepositoryError> {
        let in_memory = self.storage.cache_stats()?;
        match &self.pool {
            Some(pool) => match DatabaseStorage::cache_stats(pool) {
                Ok(stored) => Ok(stored.merge(in_memory)),
                Err(e) => {
                    error!("Failed to read cache stats from database: {}", e);
                    Ok(in_memory)
                }
            },
            None => Ok(in_memory),
        }
    }
}

/// Mock response cache for testing
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    use super::*;

    /// Mock cache that stores entries in memory and can be told to fail
    #[derive(Debug, Clone, Default)]
    pub struct MockResponseCacheRepository {
        storage: InMemoryStorage,
        failing: bool,
    }

    impl MockResponseCacheRepository {
        /// Create a new empty mock repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure every operation to fail
        pub fn with_failure(mut self) -> Self {
            self.failing = true;
            self
        }

        fn check(&self) -> Result<(), RepositoryError> {
            if self.failing {
                Err(RepositoryError::from("mock cache is configured to fail".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ResponseCacheRepositoryTrait for MockResponseCacheRepository {
        async fn get_fresh(
            &self,
            prompt_hash: &str,
            fresh_since: DateTime<Utc>,
        ) -> Result<Option<CachedResponse>, RepositoryError> {
            self.check()?;
            self.storage.get_cached(prompt_hash, &format_timestamp(&fresh_since))
        }

        async fn store(&self, entry: NewCachedResponse, created_at: DateTime<Utc>) -> Result<(), RepositoryError> {
            self.check()?;
            self.storage.upsert_cached(&entry, &format_timestamp(&created_at))
        }

        async fn record_hit(&self, prompt_hash: &str, accessed_at: DateTime<Utc>) -> Result<(), RepositoryError> {
            self.check()?;
            self.storage.record_cache_hit(prompt_hash, &format_timestamp(&accessed_at))
        }

        async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, RepositoryError> {
            self.check()?;
            self.storage.delete_cached_before(&format_timestamp(&cutoff))
        }

        async fn stats(&self) -> Result<CacheStats, RepositoryError> {
            self.check()?;
            self.storage.cache_stats()
        }
    }

}
