pub mod handlers;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tracing::info;

use nous_domain::config::OptimizerConfig;
use nous_domain::database::DatabasePool;
use nous_domain::health::{HealthService, HealthServiceTrait};
use nous_domain::services::{create_default_ai_service, AiServiceError, AiServiceTrait, BatchQueue};

/// A wired application: the router plus the handles the server binary
/// needs to run background work and shut down cleanly
pub struct Application {
    pub router: Router,
    pub ai_service: Arc<dyn AiServiceTrait>,
    pub batch_queue: BatchQueue,
}

/// Create the application from a database pool and optimizer settings
///
/// Without a pool the gateway runs on in-memory storage. Must be called
/// inside a tokio runtime since it starts the batch worker.
pub fn create_application(pool: Option<DatabasePool>, config: &OptimizerConfig) -> Result<Application, AiServiceError> {
    let optimizer = create_default_ai_service(pool.clone(), config)?;
    let providers = optimizer.configured_providers();
    info!("Gateway starting with {} configured providers", providers.len());

    let ai_service: Arc<dyn AiServiceTrait> = Arc::new(optimizer);
    let health_service: Arc<dyn HealthServiceTrait> = Arc::new(HealthService::new(pool, providers));
    let batch_queue = BatchQueue::spawn(ai_service.clone(), config.batch);

    let router = routes::create_router(ai_service.clone(), batch_queue.clone(), health_service);

    Ok(Application {
        router,
        ai_service,
        batch_queue,
    })
}
