// Repository module structure
pub mod errors;
mod cache;
mod in_memory;
mod storage;
mod usage;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use cache::{ResponseCacheRepository, ResponseCacheRepositoryTrait};
pub use usage::{UsageRepository, UsageRepositoryTrait};

// Mock repositories for both testing and when mock feature is enabled
#[cfg(any(test, feature = "mock"))]
pub mod tests {
    pub use super::cache::tests::MockResponseCacheRepository;
    pub use super::usage::tests::MockUsageRepository;
}
