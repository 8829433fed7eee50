use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Logify API",
        version = "0.1.0",
        description = "Multi-tenant log ingestion and search. Caller identity is supplied by the gateway through the x-tenant-id, x-project-id and x-user-id headers.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::logs::create_log,
        crate::handlers::logs::search_logs,
        crate::handlers::logs::list_services,
        crate::handlers::bookmarks::add_bookmark,
    ),
    components(
        schemas(
            logify::types::LogRecord,
            logify::types::SearchRequest,
            logify::types::TimestampRange,
            logify::StatsSnapshot,
            crate::dto::BookmarkRequest,
            crate::dto::HealthResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check"),
        (name = "logs", description = "Log ingestion and search"),
        (name = "bookmarks", description = "Bookmarking stored logs"),
    )
)]
pub struct ApiDoc;
