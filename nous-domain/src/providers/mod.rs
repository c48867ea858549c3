//! External AI providers
//!
//! Every provider the gateway can route to is described by a row of the
//! static [`PROVIDER_TABLE`]. The HTTP clients in the submodules implement
//! [`AiProvider`] for the wire format each vendor speaks.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::Complexity;

mod http;
pub mod gemini;
pub mod huggingface;
pub mod openai_compat;
pub mod registry;

#[cfg(test)]
mod test_server;

pub use registry::build_providers;

/// Known provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    HuggingFace,
    Gemini,
    OpenRouter,
    OpenAi,
}

impl ProviderKind {
    /// Every provider in table order
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::HuggingFace,
        ProviderKind::Gemini,
        ProviderKind::OpenRouter,
        ProviderKind::OpenAi,
    ];

    /// Name used in the usage log and the API
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "huggingface",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenRouter => "openrouter",
            ProviderKind::OpenAi => "openai",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Some(ProviderKind::HuggingFace),
            "gemini" | "google" => Some(ProviderKind::Gemini),
            "openrouter" => Some(ProviderKind::OpenRouter),
            "openai" => Some(ProviderKind::OpenAi),
            _ => None,
        }
    }

    /// Prefix of the `<PREFIX>_API_KEY` and `<PREFIX>_BASE_URL` variables
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "HUGGINGFACE",
            ProviderKind::Gemini => "GEMINI",
            ProviderKind::OpenRouter => "OPENROUTER",
            ProviderKind::OpenAi => "OPENAI",
        }
    }

    /// Public API endpoint
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::HuggingFace => "https://api-inference.huggingface.co",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the provider cost table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub free_tier: bool,
    /// USD per 1000 tokens
    pub cost_per_1k_tokens: f64,
    pub daily_limit: u64,
    pub monthly_limit: u64,
    /// Hardest prompt this provider is trusted with
    pub max_complexity: Complexity,
    /// Models to try, in order
    pub models: &'static [&'static str],
}

/// Static provider table in priority order
pub const PROVIDER_TABLE: [ProviderSpec; 4] = [
    ProviderSpec {
        kind: ProviderKind::HuggingFace,
        free_tier: true,
        cost_per_1k_tokens: 0.0,
        daily_limit: 1000,
        monthly_limit: 30_000,
        max_complexity: Complexity::Moderate,
        models: &["mistralai/Mistral-7B-Instruct-v0.2", "HuggingFaceH4/zephyr-7b-beta"],
    },
    ProviderSpec {
        kind: ProviderKind::Gemini,
        free_tier: true,
        cost_per_1k_tokens: 0.0,
        daily_limit: 1500,
        monthly_limit: 45_000,
        max_complexity: Complexity::Complex,
        models: &["gemini-1.5-flash", "gemini-1.5-flash-8b"],
    },
    ProviderSpec {
        kind: ProviderKind::OpenRouter,
        free_tier: false,
        cost_per_1k_tokens: 0.0002,
        daily_limit: 5000,
        monthly_limit: 100_000,
        max_complexity: Complexity::Complex,
        models: &["meta-llama/llama-3.1-8b-instruct", "mistralai/mistral-7b-instruct"],
    },
    ProviderSpec {
        kind: ProviderKind::OpenAi,
        free_tier: false,
        cost_per_1k_tokens: 0.0015,
        daily_limit: 500,
        monthly_limit: 10_000,
        max_complexity: Complexity::Complex,
        models: &["gpt-4o-mini", "gpt-3.5-turbo"],
    },
];

/// Table row for a provider
pub fn spec_for(kind: ProviderKind) -> &'static ProviderSpec {
    match kind {
        ProviderKind::HuggingFace => &PROVIDER_TABLE[0],
        ProviderKind::Gemini => &PROVIDER_TABLE[1],
        ProviderKind::OpenRouter => &PROVIDER_TABLE[2],
        ProviderKind::OpenAi => &PROVIDER_TABLE[3],
    }
}

/// Rough token count: one token per four characters, rounded up
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    (chars + 3) / 4
}

/// Cost in USD of `tokens` tokens on a provider
pub fn estimate_cost(spec: &ProviderSpec, tokens: u32) -> f64 {
    tokens as f64 / 1000.0 * spec.cost_per_1k_tokens
}

/// A single completion call against one model
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Text returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub model: String,
    /// Token counts, when the provider reports them
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

impl Completion {
    /// Provider-reported total, if any count was reported
    pub fn reported_tokens(&self) -> Option<u32> {
        match (self.prompt_tokens, self.completion_tokens) {
            (None, None) => None,
            (p, c) => Some(p.unwrap_or(0).saturating_add(c.unwrap_or(0))),
        }
    }
}

/// Provider call errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// No credentials for this provider
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Credentials rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Model unknown or withdrawn
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Upstream quota or rate limit hit
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Upstream 5xx
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Transport failure or timeout
    #[error("HTTP error: {0}")]
    Http(String),

    /// Body could not be parsed or held no text
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the same call may succeed if repeated
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_) | ProviderError::Server { .. } | ProviderError::Http(_)
        )
    }
}

/// A client for one external AI provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Which table row this client serves
    fn kind(&self) -> ProviderKind;

    /// Generate a completion for a single prompt
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_in_kind_order() {
        for (spec, kind) in PROVIDER_TABLE.iter().zip(ProviderKind::ALL) {
            assert_eq!(spec.kind, kind);
            assert_eq!(spec_for(kind), spec);
            assert!(!spec.models.is_empty());
        }
    }

    #[test]
    fn test_free_tier_providers_cost_nothing() {
        for spec in PROVIDER_TABLE.iter().filter(|s| s.free_tier) {
            assert_eq!(spec.cost_per_1k_tokens, 0.0);
        }
    }

    #[test]
    fn test_name_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ProviderKind::from_name("OpenAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::from_name("anthropic"), None);
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_cost() {
        let openai = spec_for(ProviderKind::OpenAi);
        assert!((estimate_cost(openai, 2000) - 0.003).abs() < 1e-12);
        assert_eq!(estimate_cost(spec_for(ProviderKind::Gemini), 2000), 0.0);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ProviderError::RateLimited("slow down".into()).is_retryable());
        assert!(ProviderError::Server { status: 503, message: "loading".into() }.is_retryable());
        assert!(ProviderError::Http("timeout".into()).is_retryable());
        assert!(!ProviderError::Auth("bad key".into()).is_retryable());
        assert!(!ProviderError::ModelUnavailable("gone".into()).is_retryable());
        assert!(!ProviderError::InvalidResponse("empty".into()).is_retryable());
    }

    #[test]
    fn test_reported_tokens() {
        let mut completion = Completion {
            text: "hi".into(),
            model: "m".into(),
            prompt_tokens: None,
            completion_tokens: None,
        };
        assert_eq!(completion.reported_tokens(), None);
        completion.completion_tokens = Some(7);
        assert_eq!(completion.reported_tokens(), Some(7));
        completion.prompt_tokens = Some(3);
        assert_eq!(completion.reported_tokens(), Some(10));
        completion.prompt_tokens = Some(u32::MAX);
        assert_eq!(completion.reported_tokens(), Some(u32::MAX));
    }
}
