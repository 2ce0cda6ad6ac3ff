//! HTTP error responses.
//!
//! Component errors are converted into [`ApiError`] at the handler boundary
//! and rendered as JSON bodies. Unexpected failures are logged in full and
//! reported to the client with a generic message only.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use protocol::messages::{MessageReply, UploadReply};
use thiserror::Error;

use crate::files::{OpsError, UploadError};

/// Realm advertised when credentials are missing.
pub const AUTH_REALM: &str = r#"Basic realm="Login Required""#;

/// Errors returned by HTTP handlers and middleware.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A request field is missing or malformed.
    #[error("{0}")]
    InvalidInput(String),

    /// An upload chunk does not fit its position.
    #[error("chunk is likely corrupted")]
    Corrupted,

    /// The requested path does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A modifying request reached a read-only server.
    #[error("This site is in read only mode")]
    ReadOnly,

    /// No valid token, cookie, or credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Anything else. The detail is logged, never sent.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// Status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) | Self::Corrupted => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ReadOnly | Self::Unexpected(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::InvalidInput(msg) | ApiError::NotFound(msg) => {
                (status, Json(MessageReply::new(msg))).into_response()
            }
            ApiError::Corrupted => (status, Json(UploadReply::corrupted())).into_response(),
            ApiError::ReadOnly => {
                (status, Json(MessageReply::new("This site is in read only mode"))).into_response()
            }
            ApiError::Unauthorized => (
                status,
                [(header::WWW_AUTHENTICATE, HeaderValue::from_static(AUTH_REALM))],
                "Please provide valid credentials.",
            )
                .into_response(),
            ApiError::Unexpected(detail) => {
                tracing::error!(%detail, "request failed");
                (status, Json(MessageReply::new("An unexpected error occurred"))).into_response()
            }
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::InvalidInput(msg) => ApiError::InvalidInput(msg.to_string()),
            UploadError::Corrupted(_) => ApiError::Corrupted,
            other => ApiError::Unexpected(other.to_string()),
        }
    }
}

impl From<OpsError> for ApiError {
    fn from(error: OpsError) -> Self {
        match error {
            OpsError::InvalidInput(msg) => ApiError::InvalidInput(msg.to_string()),
            OpsError::NotFound(_) => ApiError::NotFound("File/folder not found".into()),
            OpsError::DestinationMissing(_) => ApiError::InvalidInput(
                "Path does not exist. Check if you enter the correct path".into(),
            ),
            OpsError::AlreadyExists(_) => {
                ApiError::InvalidInput("The path you gave already exists.".into())
            }
            OpsError::Io(e) => ApiError::Unexpected(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(error: tokio::task::JoinError) -> Self {
        ApiError::Unexpected(format!("blocking task failed: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::ProtocolError;
    use std::path::PathBuf;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Corrupted.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::ReadOnly.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::Unexpected("x".into()).status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            AUTH_REALM
        );
    }

    #[test]
    fn test_upload_error_mapping() {
        let err: ApiError = UploadError::InvalidInput("Empty file").into();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m == "Empty file"));

        let err: ApiError = UploadError::Corrupted(ProtocolError::ChunkOutOfRange { index: 4, total: 2 }).into();
        assert!(matches!(err, ApiError::Corrupted));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ApiError = UploadError::Io(io).into();
        assert!(matches!(err, ApiError::Unexpected(_)));
    }

    #[test]
    fn test_ops_error_mapping() {
        let err: ApiError = OpsError::NotFound(PathBuf::from("/x")).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: ApiError = OpsError::AlreadyExists(PathBuf::from("/x")).into();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m.contains("already exists")));

        let err: ApiError = OpsError::DestinationMissing(PathBuf::from("/x")).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
