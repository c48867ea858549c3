// Domain entities and value objects
pub mod ai;
pub mod conversions;

// Re-export common types for easier imports
pub use ai::{
    AiRequest, AiResponse, Complexity, ProviderStatus, ProviderUsage, ResponseSource, UsageStats,
};
