use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::errors::SyncError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrBody<'a> {
    status: &'static str,
    message: &'a str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, msg) = match &self {
            AppError::BadRequest(s) => (StatusCode::BAD_REQUEST, s),
            AppError::NotFound(s) => (StatusCode::NOT_FOUND, s),
            AppError::Unavailable(s) => (StatusCode::SERVICE_UNAVAILABLE, s),
            AppError::Internal(s) => (StatusCode::INTERNAL_SERVER_ERROR, s),
        };
        (
            code,
            Json(ErrBody {
                status: "error",
                message: msg,
            }),
        )
            .into_response()
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Decode { .. }
            | SyncError::InvalidField { .. }
            | SyncError::Validation { .. }
            | SyncError::Serialization { .. } => AppError::BadRequest(err.to_string()),
            SyncError::NotFound { .. } => AppError::NotFound(err.to_string()),
            SyncError::StorageUnavailable { .. } => AppError::Unavailable(err.to_string()),
            SyncError::Storage { ref operation, ref source } => {
                tracing::error!(operation = %operation, error = %source, "storage write failed");
                AppError::Internal(format!("Storage {operation} failed: {source}"))
            }
            SyncError::Config { .. } | SyncError::MutexPoisoned { .. } => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_errors_map_to_http_classes() {
        assert!(matches!(
            AppError::from(SyncError::invalid_field("username", "pipe")),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(SyncError::not_found("file", "x.txt")),
            AppError::NotFound(_)
        ));
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        match AppError::from(SyncError::storage("appending to chat_log", io)) {
            AppError::Internal(msg) => assert!(msg.contains("disk full")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn error_response_has_status_code() {
        let cases = [
            (SyncError::invalid_field("message", "newline"), StatusCode::BAD_REQUEST),
            (SyncError::not_found("user", "alice"), StatusCode::NOT_FOUND),
            (
                SyncError::storage_unavailable("admin_data/user.txt"),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                SyncError::MutexPoisoned { resource: "user_file".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }
}
