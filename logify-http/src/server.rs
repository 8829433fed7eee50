use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{add_bookmark, create_log, health, list_services, search_logs, AppState};
use crate::middleware::default_json_content_type;
use crate::openapi::ApiDoc;
use logify::{LogService, LogifyConfig, StoreKind};

/// Router with every endpoint and the shared layers.
pub fn build_router(state: Arc<AppState>, max_body_mb: usize) -> Router {
    let swagger = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    let api = Router::new()
        .route("/health", get(health))
        .route("/v1/logs", post(create_log))
        .route("/v1/logs/search", post(search_logs))
        .route("/v1/logs/services", get(list_services))
        .route("/v1/bookmarks", post(add_bookmark))
        .with_state(state);

    Router::new()
        .merge(api)
        .merge(swagger)
        .layer(DefaultBodyLimit::max(max_body_mb * 1024 * 1024))
        .layer(middleware::from_fn(default_json_content_type))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive().max_age(std::time::Duration::from_secs(86400)))
}

pub async fn serve() -> Result<(), Box<dyn std::error::Error>> {
    let env_mode = std::env::var("LOGIFY_ENV").unwrap_or_else(|_| "development".into());

    let config = match LogifyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    if env_mode == "production" && config.store == StoreKind::Memory {
        eprintln!("ERROR: the in-memory store is not durable and is refused in production mode.");
        eprintln!("Set LOGIFY_STORE=opensearch and LOGIFY_OPENSEARCH_URL.");
        std::process::exit(1);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.store == StoreKind::Memory {
        tracing::warn!("⚠ Using the in-memory store: indexed logs are lost on restart.");
        tracing::warn!("⚠ Set LOGIFY_STORE=opensearch for durable search.");
    }

    tracing::info!(
        data_dir = %config.data_dir.display(),
        store = config.store.as_str(),
        namespace = %config.topic_namespace,
        group = %config.consumer_group,
        partition_date = ?config.partition_date,
        "Configuration loaded"
    );

    let service = Arc::new(LogService::open(config.clone())?);
    let cancel = CancellationToken::new();
    let background = service.start(cancel.clone());

    let app = build_router(Arc::new(AppState { service }), config.max_body_mb);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    println!("Logify listening on http://{}", local_addr);
    tracing::info!("Starting Logify server on {}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    tracing::info!("HTTP server stopped, draining consumer");
    background.shutdown().await;
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received ctrl-c, shutting down"),
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
}
