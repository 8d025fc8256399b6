use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("ValidationError: {0}")]
    Validation(String),

    #[error("AuthError: {0}")]
    Unauthorized(&'static str),

    #[error("StorageError: {message}")]
    Storage {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("PartialBatchFailure: stopped at {url} after {committed} stored")]
    PartialBatch {
        committed: usize,
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ArchiveError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ArchiveError::Validation(msg.into())
    }

    pub fn storage(message: &'static str, source: anyhow::Error) -> Self {
        ArchiveError::Storage { message, source }
    }

    pub fn status(&self) -> StatusCode {
        use ArchiveError::*;
        match self {
            Validation(_) => StatusCode::BAD_REQUEST,
            Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Storage { .. } | PartialBatch { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ArchiveError {
    fn into_response(self) -> Response {
        use ArchiveError::*;
        let status = self.status();

        let body = match &self {
            Validation(msg) => ErrorResponse::failed(msg),
            Unauthorized(msg) => ErrorResponse::failed(msg),
            Storage { message, .. } => {
                tracing::error!(error = %crate::unpack_error(&self), "storage failure");
                ErrorResponse::failed(message)
            }
            PartialBatch { committed, .. } => {
                tracing::error!(error = %crate::unpack_error(&self), committed, "batch partially stored");
                ErrorResponse::partial("failed to add bookmark", *committed)
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ArchiveError::validation("no bookmarks provided").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ArchiveError::Unauthorized("missing auth token").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ArchiveError::storage("failed to add bookmark", anyhow::anyhow!("disk gone")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unpacked_chain_keeps_cause() {
        let err = ArchiveError::PartialBatch {
            committed: 2,
            url: "https://c".to_string(),
            source: anyhow::anyhow!("database is locked"),
        };
        let text = crate::unpack_error(&err);
        assert!(text.contains("after 2 stored"));
        assert!(text.contains("database is locked"));
    }
}
