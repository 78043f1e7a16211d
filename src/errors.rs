use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::{fmt, io};
use thiserror::Error;

/// Coarse classification of a [`StoreError`].
///
/// Lets callers decide between retrying, failing fast, or falling back
/// without matching on the error payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    NotEmpty,
    Unsupported,
    InvalidName,
    Io,
}

/// Errors surfaced by every object-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("`{0}` not found")]
    NotFound(String),
    #[error("`{0}` already exists")]
    AlreadyExists(String),
    #[error("`{0}` is not empty")]
    NotEmpty(String),
    #[error("not supported by this backend: {0}")]
    Unsupported(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("invalid bucket name `{0}`")]
    InvalidBucketName(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            StoreError::NotEmpty(_) => ErrorKind::NotEmpty,
            StoreError::Unsupported(_) => ErrorKind::Unsupported,
            StoreError::InvalidKey(_) | StoreError::InvalidBucketName(_) => {
                ErrorKind::InvalidName
            }
            StoreError::Io(_) => ErrorKind::Io,
        }
    }

    /// Classify a native filesystem error raised while touching `target`.
    ///
    /// Kinds without a dedicated variant stay wrapped as `Io`.
    pub fn from_io(err: io::Error, target: impl Into<String>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(target.into()),
            io::ErrorKind::AlreadyExists => StoreError::AlreadyExists(target.into()),
            io::ErrorKind::DirectoryNotEmpty => StoreError::NotEmpty(target.into()),
            _ => StoreError::Io(err),
        }
    }
}

/// A lightweight wrapper for gateway errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists | ErrorKind::NotEmpty => StatusCode::CONFLICT,
            ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
            ErrorKind::InvalidName => StatusCode::BAD_REQUEST,
            ErrorKind::Io => return AppError::internal(err.to_string()),
        };
        AppError::new(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified_by_kind() {
        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(StoreError::from_io(missing, "a").kind(), ErrorKind::NotFound);

        let exists = io::Error::from(io::ErrorKind::AlreadyExists);
        assert_eq!(
            StoreError::from_io(exists, "a").kind(),
            ErrorKind::AlreadyExists
        );

        let busy = io::Error::from(io::ErrorKind::DirectoryNotEmpty);
        assert_eq!(StoreError::from_io(busy, "a/").kind(), ErrorKind::NotEmpty);

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(StoreError::from_io(denied, "a").kind(), ErrorKind::Io);
    }

    #[test]
    fn store_errors_map_to_http_statuses() {
        let err: AppError = StoreError::NotFound("k".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: AppError = StoreError::NotEmpty("b".into()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err: AppError = StoreError::Unsupported("marker".into()).into();
        assert_eq!(err.status, StatusCode::NOT_IMPLEMENTED);

        let err: AppError = StoreError::Io(io::Error::other("disk on fire")).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "disk on fire");
    }
}
