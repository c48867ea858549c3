use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Longest prompt the gateway accepts, in characters
pub const MAX_PROMPT_CHARS: u64 = 8000;

/// Coarse difficulty label used to route a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    /// Greetings, small talk, one-line questions
    Simple,
    /// Ordinary questions that need a real model
    Moderate,
    /// Analysis, planning, code
    Complex,
}

impl Complexity {
    /// Lowercase name as stored and serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(Complexity::Simple),
            "moderate" | "medium" => Ok(Complexity::Moderate),
            "complex" => Ok(Complexity::Complex),
            other => Err(format!("Unknown complexity: {}", other)),
        }
    }
}

/// A prompt to answer
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AiRequest {
    /// Prompt text
    #[validate(length(min = 1, max = 8000, message = "Prompt must be between 1 and 8000 characters"))]
    pub prompt: String,

    /// Complexity label; classified from the prompt when absent
    pub complexity: Option<Complexity>,

    /// Upper bound on generated tokens
    #[validate(range(min = 1, max = 4096, message = "max_tokens must be between 1 and 4096"))]
    pub max_tokens: Option<u32>,
}

impl AiRequest {
    /// Request with only a prompt
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            complexity: None,
            max_tokens: None,
        }
    }

    /// Set the complexity label
    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }
}

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Response cache
    Cache,
    /// External AI provider
    Provider,
    /// Canned keyword template
    Template,
    /// Generic apology, nothing else could answer
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Provider => "provider",
            ResponseSource::Template => "template",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// An answered prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponse {
    /// Answer text
    pub text: String,

    /// Where the answer came from
    pub source: ResponseSource,

    /// Provider that produced the text, or the source name for local answers
    pub provider: String,

    /// Model that produced the text
    pub model: Option<String>,

    /// Complexity the prompt was routed with
    pub complexity: Complexity,

    /// Cost of this request in USD
    pub cost: f64,

    /// Tokens consumed by this request
    pub tokens: u32,

    /// Whether the answer was served from cache
    pub cached: bool,

    /// Whether the answer is a degraded fallback
    pub degraded: bool,

    /// SHA-256 of the prompt
    pub prompt_hash: String,

    /// When the answer was produced
    pub answered_at: DateTime<Utc>,
}

/// Per-provider usage line in [`UsageStats`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderUsage {
    pub provider: String,
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

/// Usage statistics over the whole log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStats {
    /// Every answered request
    pub total_requests: u64,

    /// Requests answered from cache
    pub cache_hits: u64,

    /// Requests answered by a template or the generic fallback
    pub local_responses: u64,

    /// Requests answered by an external provider
    pub provider_responses: u64,

    /// Fraction of requests answered from cache
    pub cache_hit_rate: f64,

    /// Money spent in USD
    pub total_cost: f64,

    /// Money saved by cache hits in USD
    pub saved_cost: f64,

    /// Entries currently in the response cache
    pub cache_entries: u64,

    /// Breakdown by provider name
    pub by_provider: Vec<ProviderUsage>,

    /// When the statistics were computed
    pub generated_at: DateTime<Utc>,
}

/// Quota and configuration status of one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub configured: bool,
    pub free_tier: bool,
    pub cost_per_1k_tokens: f64,
    pub max_complexity: Complexity,
    pub daily_used: u64,
    pub daily_limit: u64,
    pub monthly_used: u64,
    pub monthly_limit: u64,
    pub remaining_today: u64,
    /// Configured and within both quotas
    pub available: bool,
}
