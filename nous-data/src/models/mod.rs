use chrono::{DateTime, SecondsFormat, Utc};

pub mod cache;
pub mod usage;

pub use cache::{CacheStats, CachedResponse, NewCachedResponse};
pub use usage::{NewUsageRecord, ProviderUsageSummary, UsageRecord, UsageSummary};

/// Format a timestamp the way every table stores it
///
/// Fixed-width RFC 3339 in UTC with millisecond precision, so string
/// comparison in SQL matches chronological order.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_timestamp_format_sorts_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 9, 23, 59, 59).unwrap();
        let later = earlier + Duration::milliseconds(1500);

        let a = format_timestamp(&earlier);
        let b = format_timestamp(&later);
        assert_eq!(a, "2024-01-09T23:59:59.000Z");
        assert!(a < b);
        assert_eq!(b, "2024-01-10T00:00:00.500Z");
    }

    fn slice(provider: &str, requests: u64, cost: f64) -> ProviderUsageSummary {
        ProviderUsageSummary {
            provider: provider.to_string(),
            requests,
            tokens: requests * 10,
            cost,
        }
    }

    #[test]
    fn test_usage_summaries_merge_by_provider() {
        let stored = UsageSummary {
            total_requests: 3,
            cache_hits: 1,
            total_cost: 0.5,
            saved_cost: 0.25,
            by_provider: vec![slice("cache", 1, 0.0), slice("openai", 2, 0.5)],
        };
        let buffered = UsageSummary {
            total_requests: 2,
            cache_hits: 0,
            total_cost: 0.1,
            saved_cost: 0.0,
            by_provider: vec![slice("anthropic", 1, 0.1), slice("openai", 1, 0.0)],
        };

        let merged = stored.merge(buffered);
        assert_eq!(merged.total_requests, 5);
        assert_eq!(merged.cache_hits, 1);
        assert!((merged.total_cost - 0.6).abs() < 1e-9);

        let providers: Vec<(&str, u64)> = merged
            .by_provider
            .iter()
            .map(|p| (p.provider.as_str(), p.requests))
            .collect();
        assert_eq!(providers, vec![("anthropic", 1), ("cache", 1), ("openai", 3)]);
        assert_eq!(merged.by_provider[2].tokens, 30);

        let stats = CacheStats { entries: 2, total_hits: 5 }.merge(CacheStats { entries: 1, total_hits: 0 });
        assert_eq!(stats, CacheStats { entries: 3, total_hits: 5 });
    }
}
