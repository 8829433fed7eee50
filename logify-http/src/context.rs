use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use logify::LogifyError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const PROJECT_HEADER: &str = "x-project-id";
pub const USER_HEADER: &str = "x-user-id";

/// Identity of the caller, injected as headers by the authenticating gateway
/// in front of this service. Tenant and project are mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    pub tenant_id: String,
    pub project_id: String,
    pub user_id: Option<String>,
}

fn header(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = LogifyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header(parts, TENANT_HEADER)
            .ok_or_else(|| LogifyError::MissingContext(format!("{} header", TENANT_HEADER)))?;
        let project_id = header(parts, PROJECT_HEADER)
            .ok_or_else(|| LogifyError::MissingContext(format!("{} header", PROJECT_HEADER)))?;

        Ok(CallerContext {
            tenant_id,
            project_id,
            user_id: header(parts, USER_HEADER),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<CallerContext, LogifyError> {
        let (mut parts, _) = req.into_parts();
        CallerContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extracts_headers() {
        let req = Request::builder()
            .header(TENANT_HEADER, "t1")
            .header(PROJECT_HEADER, "p1")
            .header(USER_HEADER, "u1")
            .body(())
            .unwrap();
        let ctx = extract(req).await.unwrap();
        assert_eq!(ctx.tenant_id, "t1");
        assert_eq!(ctx.project_id, "p1");
        assert_eq!(ctx.user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_blank_project_is_missing() {
        let req = Request::builder()
            .header(TENANT_HEADER, "t1")
            .header(PROJECT_HEADER, "  ")
            .body(())
            .unwrap();
        let err = extract(req).await.unwrap_err();
        assert!(matches!(err, LogifyError::MissingContext(_)));
    }
}
