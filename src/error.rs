use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum LogifyError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown topic or partition: {0}")]
    UnknownTopic(String),

    #[error("Topic already exists: {0}")]
    TopicAlreadyExists(String),

    #[error("Invalid topic name: {0}")]
    InvalidTopic(String),

    #[error("Message size {size} exceeds max {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Failed to decode record: {0}")]
    Decode(String),

    #[error("Document store error: {0}")]
    Store(String),

    #[error("Document store returned {status}: {body}")]
    StoreStatus { status: u16, body: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing caller context: {0}")]
    MissingContext(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LogifyError>;

impl From<std::io::Error> for LogifyError {
    fn from(e: std::io::Error) -> Self {
        LogifyError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for LogifyError {
    fn from(e: serde_json::Error) -> Self {
        LogifyError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for LogifyError {
    fn from(e: reqwest::Error) -> Self {
        LogifyError::Store(e.to_string())
    }
}

impl LogifyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LogifyError::Serialization(_) => StatusCode::BAD_REQUEST,
            LogifyError::UnknownTopic(_) => StatusCode::SERVICE_UNAVAILABLE,
            LogifyError::TopicAlreadyExists(_) => StatusCode::CONFLICT,
            LogifyError::InvalidTopic(_) => StatusCode::BAD_REQUEST,
            LogifyError::MessageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            LogifyError::Broker(_) => StatusCode::SERVICE_UNAVAILABLE,
            LogifyError::Decode(_) => StatusCode::BAD_REQUEST,
            LogifyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LogifyError::StoreStatus { status, .. } if *status == 400 => StatusCode::BAD_REQUEST,
            LogifyError::StoreStatus { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            LogifyError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            LogifyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            LogifyError::MissingContext(_) => StatusCode::UNAUTHORIZED,
            LogifyError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LogifyError::Json(_) => StatusCode::BAD_REQUEST,
            LogifyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code used in the error envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            LogifyError::Serialization(_) => "serialization_error",
            LogifyError::UnknownTopic(_) => "unknown_topic",
            LogifyError::TopicAlreadyExists(_) => "topic_already_exists",
            LogifyError::InvalidTopic(_) => "invalid_topic",
            LogifyError::MessageTooLarge { .. } => "message_too_large",
            LogifyError::Broker(_) => "broker_error",
            LogifyError::Decode(_) => "decode_error",
            LogifyError::Store(_) => "store_error",
            LogifyError::StoreStatus { .. } => "store_error",
            LogifyError::DocumentNotFound(_) => "document_not_found",
            LogifyError::InvalidRequest(_) => "invalid_request",
            LogifyError::MissingContext(_) => "missing_context",
            LogifyError::Io(_) => "io_error",
            LogifyError::Json(_) => "json_error",
            LogifyError::Config(_) => "config_error",
        }
    }

    /// True when the document store refused a write in a way that retrying
    /// the same body cannot fix (mapping conflicts, malformed documents).
    /// Throttling (429) and everything else count as transient.
    pub fn is_permanent_rejection(&self) -> bool {
        match self {
            LogifyError::StoreStatus { status, .. } => {
                (400..500).contains(status) && *status != 429
            }
            LogifyError::InvalidRequest(_) | LogifyError::Json(_) => true,
            _ => false,
        }
    }
}

// Axum IntoResponse implementation (feature-gated)
#[cfg(feature = "axum-support")]
use axum::response::{IntoResponse, Json, Response};
#[cfg(feature = "axum-support")]
use serde::Serialize;

#[cfg(feature = "axum-support")]
#[derive(Serialize)]
pub struct ErrorDetail {
    pub error: String,
    pub detail: String,
    pub request_id: String,
}

/// Failure envelope returned by every endpoint.
#[cfg(feature = "axum-support")]
#[derive(Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub status_code: u16,
    pub errors: ErrorDetail,
}

#[cfg(feature = "axum-support")]
impl IntoResponse for LogifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            LogifyError::Serialization(_) | LogifyError::MessageTooLarge { .. } => {
                "failed to publish log"
            }
            LogifyError::UnknownTopic(_) | LogifyError::Broker(_) => "failed to publish log",
            LogifyError::DocumentNotFound(_) => "log not found",
            LogifyError::MissingContext(_) => "unauthorized",
            LogifyError::InvalidRequest(_) | LogifyError::Json(_) | LogifyError::Decode(_) => {
                "invalid request"
            }
            LogifyError::Store(_) | LogifyError::StoreStatus { .. } => "failed to query logs",
            _ => "internal error",
        };

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "request failed");
        }

        let body = ErrorResponse {
            message: message.to_string(),
            status_code: status.as_u16(),
            errors: ErrorDetail {
                error: self.error_code().to_string(),
                detail: self.to_string(),
                request_id: format!("req_lg_{}", uuid::Uuid::new_v4()),
            },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(&self, LogifyError::Broker(_) | LogifyError::UnknownTopic(_)) {
            response
                .headers_mut()
                .insert("Retry-After", http::HeaderValue::from_static("5"));
        }
        response
    }
}
