use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use logify::error::LogifyError;
use std::sync::Arc;

use super::{json_body, AppState};
use crate::context::CallerContext;
use crate::dto::{BookmarkRequest, Envelope};

/// Bookmark one of the caller's logs
#[utoipa::path(
    post,
    path = "/v1/bookmarks",
    tag = "bookmarks",
    request_body = BookmarkRequest,
    params(
        ("x-tenant-id" = String, Header, description = "Tenant of the caller"),
        ("x-project-id" = String, Header, description = "Project of the caller")
    ),
    responses(
        (status = 200, description = "Log bookmarked", body = serde_json::Value),
        (status = 404, description = "No such log for this tenant and project")
    )
)]
pub async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    ctx: CallerContext,
    body: Result<Json<BookmarkRequest>, JsonRejection>,
) -> Result<Json<Envelope<String>>, LogifyError> {
    let req = json_body(body)?;
    state
        .service
        .bookmark(&req.log_id, &ctx.tenant_id, &ctx.project_id)
        .await?;
    Ok(Json(Envelope::data("Bookmark added successfully".to_string())))
}
