use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use crate::database::DatabasePool;
use crate::models::{CacheStats, CachedResponse, NewCachedResponse, ProviderUsageSummary, UsageRecord, UsageSummary};
use super::errors::RepositoryError;

const CACHE_COLUMNS: &str =
    "prompt_hash, prompt, response, provider, model, complexity, cost, hit_count, created_at, last_accessed";

fn map_cached_row(row: &Row<'_>) -> rusqlite::Result<CachedResponse> {
    Ok(CachedResponse {
        prompt_hash: row.get(0)?,
        prompt: row.get(1)?,
        response: row.get(2)?,
        provider: row.get(3)?,
        model: row.get(4)?,
        complexity: row.get(5)?,
        cost: row.get(6)?,
        hit_count: row.get::<_, i64>(7)? as u32,
        created_at: row.get(8)?,
        last_accessed: row.get(9)?,
    })
}

/// Database storage operations for the response cache and usage log
pub struct DatabaseStorage;

impl DatabaseStorage {
    /// Get a cached response written at or after `fresh_since`
    pub fn get_cached(
        pool: &DatabasePool,
        prompt_hash: &str,
        fresh_since: &str,
    ) -> Result<Option<CachedResponse>, RepositoryError> {
        debug!("Looking up cached response: hash={}", prompt_hash);
        let conn = pool.get()?;

        let query = format!(
            "SELECT {} FROM ai_response_cache WHERE prompt_hash = ?1 AND created_at >= ?2",
            CACHE_COLUMNS
        );
        let cached = conn
            .query_row(&query, params![prompt_hash, fresh_since], map_cached_row)
            .optional()?;

        Ok(cached)
    }

    /// Insert or replace a cached response
    pub fn upsert_cached(pool: &DatabasePool, entry: &NewCachedResponse, now: &str) -> Result<(), RepositoryError> {
        debug!("Storing cached response: hash={}, provider={}", entry.prompt_hash, entry.provider);
        let conn = pool.get()?;

        conn.execute(
            "INSERT INTO ai_response_cache
                (prompt_hash, prompt, response, provider, model, complexity, cost, hit_count, created_at, last_accessed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, ?8)
             ON CONFLICT(prompt_hash) DO UPDATE SET
                prompt = excluded.prompt,
                response = excluded.response,
                provider = excluded.provider,
                model = excluded.model,
                complexity = excluded.complexity,
                cost = excluded.cost,
                hit_count = 0,
                created_at = excluded.created_at,
                last_accessed = excluded.last_accessed",
            params![
                entry.prompt_hash,
                entry.prompt,
                entry.response,
                entry.provider,
                entry.model,
                entry.complexity,
                entry.cost,
                now,
            ],
        )?;

        Ok(())
    }

    /// Bump the hit counter of a cached response
    pub fn record_cache_hit(pool: &DatabasePool, prompt_hash: &str, now: &str) -> Result<(), RepositoryError> {
        let conn = pool.get()?;
        conn.execute(
            "UPDATE ai_response_cache SET hit_count = hit_count + 1, last_accessed = ?2 WHERE prompt_hash = ?1",
            params![prompt_hash, now],
        )?;
        Ok(())
    }

    /// Delete cached responses written before `cutoff`
    pub fn delete_cached_before(pool: &DatabasePool, cutoff: &str) -> Result<usize, RepositoryError> {
        let conn = pool.get()?;
        let deleted = conn.execute("DELETE FROM ai_response_cache WHERE created_at < ?1", params![cutoff])?;
        debug!("Deleted {} cached responses older than {}", deleted, cutoff);
        Ok(deleted)
    }

    /// Count entries and hits in the response cache
    pub fn cache_stats(pool: &DatabasePool) -> Result<CacheStats, RepositoryError> {
        let conn = pool.get()?;
        let (entries, total_hits) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(hit_count), 0) FROM ai_response_cache",
            [],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
        )?;

        Ok(CacheStats {
            entries: entries as u64,
            total_hits: total_hits as u64,
        })
    }

    /// Store a usage record
    pub fn insert_usage(pool: &DatabasePool, record: &UsageRecord) -> Result<(), RepositoryError> {
        debug!("Logging usage: provider={}, cache_hit={}", record.provider, record.cache_hit);
        let conn = pool.get()?;

        conn.execute(
            "INSERT INTO ai_usage_log
                (id, provider, model, complexity, prompt_hash, tokens, cost, saved_cost, cache_hit, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.provider,
                record.model,
                record.complexity,
                record.prompt_hash,
                record.tokens as i64,
                record.cost,
                record.saved_cost,
                record.cache_hit as i64,
                record.created_at,
            ],
        )?;

        Ok(())
    }

    /// Count non-cache requests sent to a provider since a timestamp
    pub fn count_provider_requests(pool: &DatabasePool, provider: &str, since: &str) -> Result<u64, RepositoryError> {
        let conn = pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ai_usage_log WHERE provider = ?1 AND cache_hit = 0 AND created_at >= ?2",
            params![provider, since],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Aggregate the usage log, optionally from a timestamp onward
    pub fn usage_summary(pool: &DatabasePool, since: Option<&str>) -> Result<UsageSummary, RepositoryError> {
        let conn = pool.get()?;

        // An empty lower bound sorts before every stored timestamp
        let since = since.unwrap_or("");

        let (total_requests, cache_hits, total_cost, saved_cost) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(cache_hit), 0),
                    COALESCE(SUM(cost), 0.0),
                    COALESCE(SUM(saved_cost), 0.0)
             FROM ai_usage_log WHERE created_at >= ?1",
            params![since],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            },
        )?;

        let mut stmt = conn.prepare(
            "SELECT provider, COUNT(*), COALESCE(SUM(tokens), 0), COALESCE(SUM(cost), 0.0)
             FROM ai_usage_log WHERE created_at >= ?1
             GROUP BY provider ORDER BY provider ASC",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok(ProviderUsageSummary {
                provider: row.get(0)?,
                requests: row.get::<_, i64>(1)? as u64,
                tokens: row.get::<_, i64>(2)? as u64,
                cost: row.get(3)?,
            })
        })?;

        let mut by_provider = Vec::new();
        for row in rows {
            by_provider.push(row?);
        }

        Ok(UsageSummary {
            total_requests: total_requests as u64,
            cache_hits: cache_hits as u64,
            total_cost,
            saved_cost,
            by_provider,
        })
    }
}
