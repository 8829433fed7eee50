use logify::StatsSnapshot;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub status_code: u16,
}

impl<T> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            data: Some(data),
            message: Some(message.into()),
            status_code: 200,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            data: None,
            message: Some(message.into()),
            status_code: 200,
        }
    }

    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            message: None,
            status_code: 200,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookmarkRequest {
    pub log_id: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ServicesQuery {
    /// `project` limits the list to the caller's tenant and project.
    pub scope: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub store: String,
    pub consumer: StatsSnapshot,
    pub build_profile: String,
}
