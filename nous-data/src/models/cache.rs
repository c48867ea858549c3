use serde::{Deserialize, Serialize};

/// Storage model for a cached AI response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedResponse {
    /// SHA-256 of the trimmed prompt, lowercase hex
    pub prompt_hash: String,

    /// Prompt text the response answers
    pub prompt: String,

    /// Response text returned by the provider
    pub response: String,

    /// Provider that produced the response
    pub provider: String,

    /// Model that produced the response
    pub model: String,

    /// Complexity label the prompt was routed with
    pub complexity: String,

    /// Cost of the original provider call in USD
    pub cost: f64,

    /// Number of times the entry has been served from cache
    pub hit_count: u32,

    /// When the entry was written
    pub created_at: String,

    /// When the entry was last served
    pub last_accessed: String,
}

/// Input data for caching a provider response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCachedResponse {
    pub prompt_hash: String,
    pub prompt: String,
    pub response: String,
    pub provider: String,
    pub model: String,
    pub complexity: String,
    pub cost: f64,
}

/// Aggregate figures about the response cache
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    /// Number of cached entries
    pub entries: u64,

    /// Sum of hit counts over all entries
    pub total_hits: u64,
}

impl CacheStats {
    /// Add the figures of another store
    pub fn merge(self, other: CacheStats) -> Self {
        Self {
            entries: self.entries + other.entries,
            total_hits: self.total_hits + other.total_hits,
        }
    }
}
