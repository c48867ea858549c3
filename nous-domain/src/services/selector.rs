//! Provider selection against the static cost table and usage quotas

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use nous_data::repository::{RepositoryError, UsageRepositoryTrait};
use tracing::{debug, warn};

use crate::entities::Complexity;
use crate::providers::{ProviderKind, ProviderSpec, PROVIDER_TABLE};

/// Providers able to handle `complexity` that have credentials, cheapest first
///
/// Free-tier providers come before paid ones, then ascending cost, then
/// table order.
pub fn rank_candidates(complexity: Complexity, configured: &[ProviderKind]) -> Vec<&'static ProviderSpec> {
    let mut candidates: Vec<&'static ProviderSpec> = PROVIDER_TABLE
        .iter()
        .filter(|spec| spec.max_complexity >= complexity && configured.contains(&spec.kind))
        .collect();

    candidates.sort_by(|a, b| {
        b.free_tier
            .cmp(&a.free_tier)
            .then_with(|| a.cost_per_1k_tokens.partial_cmp(&b.cost_per_1k_tokens).unwrap_or(Ordering::Equal))
    });
    candidates
}

/// Whether usage is strictly below both the daily and monthly limits
pub fn has_quota(spec: &ProviderSpec, daily_used: u64, monthly_used: u64) -> bool {
    daily_used < spec.daily_limit && monthly_used < spec.monthly_limit
}

/// 00:00 UTC of the day containing `now`
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// 00:00 UTC on the first of the month containing `now`
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Requests a provider served today and this month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaUsage {
    pub daily: u64,
    pub monthly: u64,
}

/// Count the provider's non-cache requests in the current day and month
pub async fn quota_usage<U>(usage: &U, kind: ProviderKind, now: DateTime<Utc>) -> Result<QuotaUsage, RepositoryError>
where
    U: UsageRepositoryTrait + ?Sized,
{
    let daily = usage.count_provider_requests(kind.name(), day_start(now)).await?;
    let monthly = usage.count_provider_requests(kind.name(), month_start(now)).await?;
    Ok(QuotaUsage { daily, monthly })
}

/// Ranked candidates that still have quota
///
/// A provider whose usage cannot be counted is kept.
pub async fn select_providers<U>(
    usage: &U,
    complexity: Complexity,
    configured: &[ProviderKind],
    now: DateTime<Utc>,
) -> Vec<&'static ProviderSpec>
where
    U: UsageRepositoryTrait + ?Sized,
{
    let mut selected = Vec::new();

    for spec in rank_candidates(complexity, configured) {
        match quota_usage(usage, spec.kind, now).await {
            Ok(used) if has_quota(spec, used.daily, used.monthly) => selected.push(spec),
            Ok(used) => {
                debug!(
                    "Skipping {}: quota exhausted (day {}/{}, month {}/{})",
                    spec.kind, used.daily, spec.daily_limit, used.monthly, spec.monthly_limit
                );
            }
            Err(e) => {
                warn!("Could not count usage for {}, assuming quota is available: {}", spec.kind, e);
                selected.push(spec);
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::spec_for;
    use nous_data::repository::tests::MockUsageRepository;

    fn kinds(specs: &[&'static ProviderSpec]) -> Vec<ProviderKind> {
        specs.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_free_tier_before_paid_then_by_cost() {
        let ranked = rank_candidates(Complexity::Simple, &ProviderKind::ALL);
        assert_eq!(
            kinds(&ranked),
            vec![
                ProviderKind::HuggingFace,
                ProviderKind::Gemini,
                ProviderKind::OpenRouter,
                ProviderKind::OpenAi
            ]
        );
    }

    #[test]
    fn test_complexity_filters_weak_providers() {
        let ranked = rank_candidates(Complexity::Complex, &ProviderKind::ALL);
        assert!(!kinds(&ranked).contains(&ProviderKind::HuggingFace));
        assert_eq!(ranked[0].kind, ProviderKind::Gemini);
    }

    #[test]
    fn test_unconfigured_providers_are_excluded() {
        let ranked = rank_candidates(Complexity::Moderate, &[ProviderKind::OpenAi, ProviderKind::OpenRouter]);
        assert_eq!(kinds(&ranked), vec![ProviderKind::OpenRouter, ProviderKind::OpenAi]);
        assert!(rank_candidates(Complexity::Simple, &[]).is_empty());
    }

    #[test]
    fn test_has_quota_is_strict() {
        let spec = spec_for(ProviderKind::OpenAi);
        assert!(has_quota(spec, 499, 9_999));
        assert!(!has_quota(spec, 500, 0));
        assert!(!has_quota(spec, 0, 10_000));
    }

    #[test]
    fn test_windows() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 17, 45, 12).unwrap();
        assert_eq!(day_start(now), Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
        assert_eq!(month_start(now), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_exhausted_provider_is_skipped() {
        let now = Utc::now();
        let usage = MockUsageRepository::new().with_requests("gemini", 1500, now);

        let selected = select_providers(&usage, Complexity::Complex, &ProviderKind::ALL, now).await;
        assert_eq!(kinds(&selected), vec![ProviderKind::OpenRouter, ProviderKind::OpenAi]);
    }

    #[tokio::test]
    async fn test_yesterdays_usage_does_not_count_today() {
        let now = Utc::now();
        let yesterday = day_start(now) - chrono::Duration::seconds(1);
        let usage = MockUsageRepository::new().with_requests("openai", 500, yesterday);

        let used = quota_usage(&usage, ProviderKind::OpenAi, now).await.unwrap();
        assert_eq!(used.daily, 0);

        let selected = select_providers(&usage, Complexity::Simple, &[ProviderKind::OpenAi], now).await;
        // Still within the monthly quota unless yesterday was last month
        if month_start(now) <= yesterday {
            assert_eq!(used.monthly, 500);
        }
        assert_eq!(kinds(&selected), vec![ProviderKind::OpenAi]);
    }

    #[tokio::test]
    async fn test_usage_failure_fails_open() {
        let usage = MockUsageRepository::new().with_failure();
        let selected = select_providers(&usage, Complexity::Simple, &[ProviderKind::Gemini], Utc::now()).await;
        assert_eq!(kinds(&selected), vec![ProviderKind::Gemini]);
    }
}
