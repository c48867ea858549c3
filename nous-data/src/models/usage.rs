use serde::{Deserialize, Serialize};

/// Storage model for one answered request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRecord {
    /// Unique identifier for the record
    pub id: String,

    /// Provider name, or `cache`, `template`, `fallback`
    pub provider: String,

    /// Model used, if a provider answered
    pub model: Option<String>,

    /// Complexity label of the request
    pub complexity: String,

    /// Hash of the prompt, shared with the cache key
    pub prompt_hash: String,

    /// Tokens consumed (prompt plus completion)
    pub tokens: u32,

    /// Cost charged in USD
    pub cost: f64,

    /// Cost avoided by answering from cache
    pub saved_cost: f64,

    /// Whether the answer came from cache
    pub cache_hit: bool,

    /// When the request was answered
    pub created_at: String,
}

/// Input data for a usage log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUsageRecord {
    pub provider: String,
    pub model: Option<String>,
    pub complexity: String,
    pub prompt_hash: String,
    pub tokens: u32,
    pub cost: f64,
    pub saved_cost: f64,
    pub cache_hit: bool,
}

/// Per-provider slice of a usage summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderUsageSummary {
    pub provider: String,
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

/// Aggregated usage figures
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageSummary {
    /// Every logged request
    pub total_requests: u64,

    /// Requests answered from cache
    pub cache_hits: u64,

    /// Total cost in USD
    pub total_cost: f64,

    /// Cost avoided by cache hits in USD
    pub saved_cost: f64,

    /// Breakdown by provider name, sorted by name
    pub by_provider: Vec<ProviderUsageSummary>,
}

impl UsageSummary {
    /// Fold another summary into this one, keeping `by_provider` sorted by name
    pub fn merge(mut self, other: UsageSummary) -> Self {
        self.total_requests += other.total_requests;
        self.cache_hits += other.cache_hits;
        self.total_cost += other.total_cost;
        self.saved_cost += other.saved_cost;

        for slice in other.by_provider {
            match self.by_provider.iter_mut().find(|p| p.provider == slice.provider) {
                Some(existing) => {
                    existing.requests += slice.requests;
                    existing.tokens += slice.tokens;
                    existing.cost += slice.cost;
                }
                None => self.by_provider.push(slice),
            }
        }
        self.by_provider.sort_by(|a, b| a.provider.cmp(&b.provider));
        self
    }
}
