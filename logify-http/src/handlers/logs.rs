use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use logify::error::LogifyError;
use logify::types::{LogDocument, LogRecord, SearchRequest};
use std::sync::Arc;

use super::{json_body, AppState};
use crate::context::CallerContext;
use crate::dto::{Envelope, ServicesQuery};

/// Publish one log record for the caller's project
#[utoipa::path(
    post,
    path = "/v1/logs",
    tag = "logs",
    request_body = LogRecord,
    params(
        ("x-tenant-id" = String, Header, description = "Tenant of the caller"),
        ("x-project-id" = String, Header, description = "Project of the caller"),
        ("x-user-id" = Option<String>, Header, description = "User of the caller")
    ),
    responses(
        (status = 200, description = "Record accepted by the broker", body = serde_json::Value),
        (status = 400, description = "Malformed record"),
        (status = 401, description = "Missing tenant or project context"),
        (status = 413, description = "Record exceeds the topic's max message size"),
        (status = 503, description = "Broker unavailable")
    )
)]
pub async fn create_log(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    body: Result<Json<LogRecord>, JsonRejection>,
) -> Result<Json<Envelope<()>>, LogifyError> {
    let record =
        json_body(body)?.scoped(&ctx.tenant_id, &ctx.project_id, ctx.user_id.as_deref());

    let delivery = state.service.publish(&record).await?;
    tracing::debug!(
        topic = %delivery.topic,
        partition = delivery.partition,
        offset = delivery.offset,
        "log published"
    );

    Ok(Json(Envelope::message("log created successfully")))
}

/// Search the caller's logs
#[utoipa::path(
    post,
    path = "/v1/logs/search",
    tag = "logs",
    request_body = SearchRequest,
    params(
        ("x-tenant-id" = String, Header, description = "Tenant of the caller"),
        ("x-project-id" = String, Header, description = "Project of the caller")
    ),
    responses(
        (status = 200, description = "Matching logs, newest first by default", body = serde_json::Value),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Missing tenant or project context")
    )
)]
pub async fn search_logs(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Envelope<Vec<LogDocument>>>, LogifyError> {
    let req = json_body(body)?.scoped(&ctx.tenant_id, &ctx.project_id);
    let logs = state.service.search(&req).await?;
    Ok(Json(Envelope::ok("Get log", logs)))
}

/// List known service names
///
/// Without `scope` the list spans every tenant. `scope=project` restricts it
/// to the caller's tenant and project, which then requires caller context.
#[utoipa::path(
    get,
    path = "/v1/logs/services",
    tag = "logs",
    params(ServicesQuery),
    responses(
        (status = 200, description = "Distinct service names", body = serde_json::Value),
        (status = 401, description = "Missing context for a project-scoped listing")
    )
)]
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    ctx: Option<CallerContext>,
    Query(query): Query<ServicesQuery>,
) -> Result<Json<Envelope<Vec<String>>>, LogifyError> {
    let services = match query.scope.as_deref() {
        Some("project") => {
            let ctx = ctx.ok_or_else(|| {
                LogifyError::MissingContext("project scope needs tenant and project".into())
            })?;
            state
                .service
                .list_project_services(&ctx.tenant_id, &ctx.project_id)
                .await?
        }
        None | Some("") | Some("all") => state.service.list_services().await?,
        Some(other) => {
            return Err(LogifyError::InvalidRequest(format!(
                "unknown scope '{}', expected 'project' or 'all'",
                other
            )))
        }
    };
    Ok(Json(Envelope::ok("Get log", services)))
}
