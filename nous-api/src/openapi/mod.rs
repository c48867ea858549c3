use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health endpoints
        crate::api::handlers::health::health_check,

        // AI gateway endpoints
        crate::api::handlers::ai::chat,
        crate::api::handlers::ai::batch,
        crate::api::handlers::ai::usage,
        crate::api::handlers::ai::providers,
        crate::api::handlers::ai::cleanup_cache
    ),
    components(
        schemas(
            crate::entities::ai::Complexity,
            crate::entities::ai::ChatRequest,
            crate::entities::ai::ChatResponse,
            crate::entities::ai::BatchRequest,
            crate::entities::ai::BatchItemResult,
            crate::entities::ai::BatchResponse,
            crate::entities::ai::ProviderUsageResponse,
            crate::entities::ai::UsageResponse,
            crate::entities::ai::ProviderStatusResponse,
            crate::entities::ai::ProviderListResponse,
            crate::entities::ai::CleanupResponse,
            crate::entities::common::ErrorResponse,

            crate::api::handlers::health::HealthResponse,
            crate::api::handlers::health::ComponentHealthStatus
        )
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "ai", description = "Cost-optimized AI gateway endpoints")
    ),
    info(
        title = "NOUS AI Gateway API",
        version = "0.1.0",
        description = "Answers prompts from cache, free-tier and paid AI providers at the lowest available cost",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;
