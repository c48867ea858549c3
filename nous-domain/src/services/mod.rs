pub mod batch;
pub mod complexity;
pub mod maintenance;
pub mod optimizer;
pub mod retry;
pub mod selector;
pub mod templates;

// Domain services
// This module contains the routing logic of the AI gateway.

// Re-export service traits and factory functions
pub use batch::BatchQueue;
pub use complexity::classify_complexity;
pub use maintenance::spawn_cache_cleanup;
pub use optimizer::{create_default_ai_service, prompt_hash, AiServiceError, AiServiceTrait, CostOptimizer};
pub use retry::{complete_with_fallback, RetryPolicy};
pub use templates::{fallback_response, TemplateResponder};
