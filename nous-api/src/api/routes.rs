use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use nous_domain::health::HealthServiceTrait;
use nous_domain::services::{AiServiceTrait, BatchQueue};

use crate::api::handlers::{ai, health};
use crate::openapi::configure_swagger_routes;

/// State shared by the AI handlers
#[derive(Clone)]
pub struct AppState {
    pub ai_service: Arc<dyn AiServiceTrait>,
    pub batch_queue: BatchQueue,
}

/// Create the application router
pub fn create_router(
    ai_service: Arc<dyn AiServiceTrait>,
    batch_queue: BatchQueue,
    health_service: Arc<dyn HealthServiceTrait>,
) -> Router {
    debug!("Creating application router");

    let state = AppState {
        ai_service,
        batch_queue,
    };

    let api_routes = Router::new()
        .route("/ai/chat", post(ai::chat))
        .route("/ai/batch", post(ai::batch))
        .route("/ai/usage", get(ai::usage))
        .route("/ai/providers", get(ai::providers))
        .route("/ai/cache/cleanup", post(ai::cleanup_cache))
        .with_state(state);

    debug!("API routes configured");

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .layer(Extension(health_service));

    let app = Router::new().merge(public_routes).nest("/api/v1", api_routes);

    let app = add_swagger_ui(app);
    debug!("Swagger UI merged");

    health::initialize_server_start_time();

    app.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive())
}

/// Add Swagger UI to the router
pub fn add_swagger_ui(app: Router) -> Router {
    app.merge(configure_swagger_routes())
}
