use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::services::optimizer::AiServiceTrait;

/// Run cache retention on a fixed interval
///
/// The first run happens immediately. Failures are logged and the loop
/// keeps going; abort the returned handle to stop it.
pub fn spawn_cache_cleanup(service: Arc<dyn AiServiceTrait>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match service.cleanup_cache().await {
                Ok(deleted) => info!("Scheduled cache cleanup deleted {} entries", deleted),
                Err(e) => error!("Scheduled cache cleanup failed: {}", e),
            }
        }
    })
}
