use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};
use uuid::Uuid;

use crate::database::DatabasePool;
use crate::models::{format_timestamp, NewUsageRecord, UsageRecord, UsageSummary};
use super::errors::RepositoryError;
use super::in_memory::InMemoryStorage;
use super::storage::DatabaseStorage;

/// Repository trait for the provider usage log
#[async_trait]
pub trait UsageRepositoryTrait: Send + Sync {
    /// Append a usage record
    async fn record(&self, record: NewUsageRecord, at: DateTime<Utc>) -> Result<UsageRecord, RepositoryError>;

    /// Count non-cache requests a provider served since `since`
    async fn count_provider_requests(&self, provider: &str, since: DateTime<Utc>) -> Result<u64, RepositoryError>;

    /// Aggregate usage, optionally limited to records since a timestamp
    async fn summary(&self, since: Option<DateTime<Utc>>) -> Result<UsageSummary, RepositoryError>;
}

fn build_record(record: NewUsageRecord, at: DateTime<Utc>) -> UsageRecord {
    UsageRecord {
        id: Uuid::new_v4().to_string(),
        provider: record.provider,
        model: record.model,
        complexity: record.complexity,
        prompt_hash: record.prompt_hash,
        tokens: record.tokens,
        cost: record.cost,
        saved_cost: record.saved_cost,
        cache_hit: record.cache_hit,
        created_at: format_timestamp(&at),
    }
}

/// Usage log backed by SQLite, with in-memory storage when the database
/// is missing or failing
#[derive(Debug, Clone, Default)]
pub struct UsageRepository {
    pool: Option<DatabasePool>,
    storage: InMemoryStorage,
}

impl UsageRepository {
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
impl UsageRepositoryTrait for UsageRepository {
    async fn record(&self, record: NewUsageRecord, at: DateTime<Utc>) -> Result<UsageRecord, RepositoryError> {
        let record = build_record(record, at);

        match &self.pool {
            Some(pool) => match DatabaseStorage::insert_usage(pool, &record) {
                Ok(()) => Ok(record),
                Err(e) => {
                    error!("Failed to store usage record in database: {}", e);
                    self.storage.insert_usage(&record)?;
                    Ok(record)
                }
            },
            None => {
                debug!("Database not available, using in-memory usage log");
                self.storage.insert_usage(&record)?;
                Ok(record)
            }
        }
    }

    async fn count_provider_requests(&self, provider: &str, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let since = format_timestamp(&since);

        let in_memory = self.storage.count_provider_requests(provider, &since)?;
        match &self.pool {
            Some(pool) => Ok(DatabaseStorage::count_provider_requests(pool, provider, &since)? + in_memory),
            None => Ok(in_memory),
        }
    }

    async fn summary(&self, since: Option<DateTime<Utc>>) -> Result<UsageSummary, RepositoryError> {
        let since = since.map(|s| format_timestamp(&s));

        // Records land in memory whenever a database write failed
        let in_memory = self.storage.usage_summary(since.as_deref())?;
        match &self.pool {
            Some(pool) => match DatabaseStorage::usage_summary(pool, since.as_deref()) {
                Ok(stored) => Ok(stored.merge(in_memory)),
                Err(e) => {
                    error!("Failed to read usage summary from database: {}", e);
                    Ok(in_memory)
                }
            },
            None => Ok(in_memory),
        }
    }
}

/// Mock usage log for testing
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    use super::*;

    /// Mock usage log that keeps records in memory and can be told to fail
    #[derive(Debug, Clone, Default)]
    pub struct MockUsageRepository {
        storage: InMemoryStorage,
        failing: bool,
    }

    impl MockUsageRepository {
        /// Create a new empty mock repository
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure every operation to fail
        pub fn with_failure(mut self) -> Self {
            self.failing = true;
            self
        }

        /// Pre-load `count` provider requests at the given time
        pub fn with_requests(self, provider: &str, count: usize, at: DateTime<Utc>) -> Self {
            for _ in 0..count {
                let record = build_record(
                    NewUsageRecord {
                        provider: provider.to_string(),
                        model: None,
                        complexity: "moderate".to_string(),
                        prompt_hash: String::new(),
                        tokens: 0,
                        cost: 0.0,
                        saved_cost: 0.0,
                        cache_hit: false,
                    },
                    at,
                );
                // The storage mutex cannot be poisoned before the mock is shared
                let _ = self.storage.insert_usage(&record);
            }
            self
        }

        fn check(&self) -> Result<(), RepositoryError> {
            if self.failing {
                Err(RepositoryError::from("mock usage log is configured to fail".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl UsageRepositoryTrait for MockUsageRepository {
        async fn record(&self, record: NewUsageRecord, at: DateTime<Utc>) -> Result<UsageRecord, RepositoryError> {
            self.check()?;
            let record = build_record(record, at);
            self.storage.insert_usage(&record)?;
            Ok(record)
        }

        async fn count_provider_requests(&self, provider: &str, since: DateTime<Utc>) -> Result<u64, RepositoryError> {
            self.check()?;
            self.storage.count_provider_requests(provider, &format_timestamp(&since))
        }

        async fn summary(&self, since: Option<DateTime<Utc>>) -> Result<UsageSummary, RepositoryError> {
            self.check()?;
            let since = since.map(|s| format_timestamp(&s));
            self.storage.usage_summary(since.as_deref())
        }
    }

    #[cfg(test)]
    mod repository_tests {
        use super::super::*;
        use crate::database::{initialize_database_pool, run_migrations, DatabaseConfig, MigrationOptions};
        use chrono::Duration;

        fn migrated_pool() -> DatabasePool {
            let pool = initialize_database_pool(&DatabaseConfig::in_memory()).unwrap();
            {
                let mut conn = pool.get().unwrap();
                run_migrations(&mut conn, MigrationOptions::default()).unwrap();
            }
            pool
        }

        fn usage(provider: &str, cost: f64, saved_cost: f64, cache_hit: bool) -> NewUsageRecord {
            NewUsageRecord {
                provider: provider.to_string(),
                model: Some("model".to_string()),
                complexity: "simple".to_string(),
                prompt_hash: "hash".to_string(),
                tokens: 100,
                cost,
                saved_cost,
                cache_hit,
            }
        }

        #[tokio::test]
        async fn test_count_excludes_cache_hits_and_old_rows() {
            let repo = UsageRepository::new(migrated_pool());
            let now = Utc::now();

            repo.record(usage("openai", 0.01, 0.0, false), now).await.unwrap();
            repo.record(usage("openai", 0.01, 0.0, false), now - Duration::days(2)).await.unwrap();
            repo.record(usage("openai", 0.0, 0.01, true), now).await.unwrap();
            repo.record(usage("gemini", 0.0, 0.0, false), now).await.unwrap();

            let today = repo.count_provider_requests("openai", now - Duration::hours(1)).await.unwrap();
            assert_eq!(today, 1);

            let week = repo.count_provider_requests("openai", now - Duration::days(7)).await.unwrap();
            assert_eq!(week, 2);
        }

        #[tokio::test]
        async fn test_summary_totals_and_breakdown() {
            let repo = UsageRepository::new(migrated_pool());
            let now = Utc::now();

            repo.record(usage("openai", 0.25, 0.0, false), now).await.unwrap();
            repo.record(usage("cache", 0.0, 0.25, true), now).await.unwrap();
            repo.record(usage("template", 0.0, 0.0, false), now).await.unwrap();

            let summary = repo.summary(None).await.unwrap();
            assert_eq!(summary.total_requests, 3);
            assert_eq!(summary.cache_hits, 1);
            assert!((summary.total_cost - 0.25).abs() < 1e-9);
            assert!((summary.saved_cost - 0.25).abs() < 1e-9);

            let providers: Vec<&str> = summary.by_provider.iter().map(|p| p.provider.as_str()).collect();
            assert_eq!(providers, vec!["cache", "openai", "template"]);
        }

        #[tokio::test]
        async fn test_summary_since_filters_old_records() {
            let repo = UsageRepository::in_memory();
            let now = Utc::now();

            repo.record(usage("openai", 1.0, 0.0, false), now - Duration::days(40)).await.unwrap();
            repo.record(usage("openai", 2.0, 0.0, false), now).await.unwrap();

            let summary = repo.summary(Some(now - Duration::days(30))).await.unwrap();
            assert_eq!(summary.total_requests, 1);
            assert!((summary.total_cost - 2.0).abs() < 1e-9);
        }

        #[tokio::test]
        async fn test_summary_includes_records_kept_in_memory_after_write_failure() {
            let pool = migrated_pool();
            let repo = UsageRepository::new(pool.clone());
            let now = Utc::now();

            pool.get()
                .unwrap()
                .execute_batch("ALTER TABLE ai_usage_log RENAME TO ai_usage_log_offline")
                .unwrap();
            repo.record(usage("openai", 0.5, 0.0, false), now).await.unwrap();

            // Reads fail too while the table is gone
            let summary = repo.summary(None).await.unwrap();
            assert_eq!(summary.total_requests, 1);

            pool.get()
                .unwrap()
                .execute_batch("ALTER TABLE ai_usage_log_offline RENAME TO ai_usage_log")
                .unwrap();
            repo.record(usage("openai", 0.25, 0.0, false), now).await.unwrap();
            repo.record(usage("cache", 0.0, 0.25, true), now).await.unwrap();

            let summary = repo.summary(None).await.unwrap();
            assert_eq!(summary.total_requests, 3);
            assert_eq!(summary.cache_hits, 1);
            assert!((summary.total_cost - 0.75).abs() < 1e-9);

            let providers: Vec<(&str, u64)> = summary
                .by_provider
                .iter()
                .map(|p| (p.provider.as_str(), p.requests))
                .collect();
            assert_eq!(providers, vec![("cache", 1), ("openai", 2)]);
            assert_eq!(repo.count_provider_requests("openai", now - Duration::hours(1)).await.unwrap(), 2);
        }
    }
}
