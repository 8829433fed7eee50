use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tenant identifier, opaque to the pipeline.
pub type TenantId = String;
/// Project identifier. Assumed globally unique: one topic per project.
pub type ProjectId = String;
/// A stored document as returned by search: a JSON object.
pub type LogDocument = serde_json::Map<String, serde_json::Value>;

/// The canonical unit of ingestion.
///
/// `tenant_id` and `project_id` always come from the caller context; whatever
/// the request body carried is overwritten at the boundary via
/// [`LogRecord::scoped`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LogRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub tenant_id: TenantId,
    #[serde(default)]
    pub project_id: ProjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub is_bookmark: bool,
    #[serde(default)]
    pub timestamp: String,
}

impl LogRecord {
    /// Overwrite the ownership fields with the caller's context and default
    /// the timestamp to now (UTC) when absent.
    pub fn scoped(mut self, tenant_id: &str, project_id: &str, user_id: Option<&str>) -> Self {
        self.tenant_id = tenant_id.to_string();
        self.project_id = project_id.to_string();
        self.user_id = user_id.map(str::to_string);
        if self.timestamp.trim().is_empty() {
            self.timestamp =
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        }
        self
    }

    /// Parse the record's own timestamp, if it is a valid RFC 3339 instant.
    pub fn parsed_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(self.timestamp.trim())
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc))
    }
}

/// Inclusive timestamp bounds. Both must be non-empty for the filter to apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TimestampRange {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

impl TimestampRange {
    pub fn is_complete(&self) -> bool {
        !self.from.trim().is_empty() && !self.to.trim().is_empty()
    }
}

/// Structured search over one tenant/project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SearchRequest {
    #[serde(default)]
    pub tenant_id: TenantId,
    #[serde(default)]
    pub project_id: ProjectId,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub message_contains: Vec<String>,
    #[serde(default)]
    pub timestamp_range: TimestampRange,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub sort: String,
    #[serde(default)]
    pub order: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub limit: i64,
}

impl SearchRequest {
    /// Pin the request to the caller's tenant and project.
    pub fn scoped(mut self, tenant_id: &str, project_id: &str) -> Self {
        self.tenant_id = tenant_id.to_string();
        self.project_id = project_id.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Ascending only for exactly `"asc"`; anything else, including `"ASC"`,
    /// sorts descending.
    pub fn from_param(order: &str) -> Self {
        if order == "asc" {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Broker acknowledgment for one published record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scoped_overwrites_body_ownership() {
        let record: LogRecord = serde_json::from_value(json!({
            "tenant_id": "evil",
            "project_id": "other",
            "level": "INFO",
            "message": "hello",
            "service": "api"
        }))
        .unwrap();

        let record = record.scoped("t1", "p1", Some("u1"));
        assert_eq!(record.tenant_id, "t1");
        assert_eq!(record.project_id, "p1");
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert!(record.parsed_timestamp().is_some());
        assert!(!record.is_bookmark);
    }

    #[test]
    fn test_scoped_keeps_supplied_timestamp() {
        let record = LogRecord {
            timestamp: "2025-01-07T09:53:01Z".into(),
            ..Default::default()
        }
        .scoped("t1", "p1", None);
        assert_eq!(record.timestamp, "2025-01-07T09:53:01Z");
        assert_eq!(
            record.parsed_timestamp().unwrap().to_rfc3339(),
            "2025-01-07T09:53:01+00:00"
        );
    }

    #[test]
    fn test_sort_order_from_param() {
        assert_eq!(SortOrder::from_param("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::from_param("ASC"), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(" asc "), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(""), SortOrder::Desc);
        assert_eq!(SortOrder::from_param("sideways"), SortOrder::Desc);
    }

    #[test]
    fn test_search_request_defaults() {
        let req: SearchRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(req.page, 0);
        assert_eq!(req.limit, 0);
        assert!(!req.timestamp_range.is_complete());
    }
}
