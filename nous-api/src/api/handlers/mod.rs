pub mod ai;
pub mod health;

pub use ai::{batch, chat, cleanup_cache, providers, usage};
pub use health::health_check;
