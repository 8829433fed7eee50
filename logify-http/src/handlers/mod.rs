use axum::extract::rejection::JsonRejection;
use axum::Json;
use logify::{LogService, LogifyError};
use std::sync::Arc;

pub mod bookmarks;
pub mod health;
pub mod logs;

pub struct AppState {
    pub service: Arc<LogService>,
}

/// Unwrap a JSON body, turning extractor rejections into the error envelope.
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, LogifyError> {
    body.map(|Json(v)| v)
        .map_err(|rejection| LogifyError::InvalidRequest(rejection.body_text()))
}

pub use bookmarks::add_bookmark;
pub use health::health;
pub use logs::{create_log, list_services, search_logs};
