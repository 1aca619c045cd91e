//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::InputError;
use crate::Error;

/// Errors returned by the resource handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Larder(#[from] Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl ApiError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidBody(_) => InputError::InvalidBody.code(),
            Self::Larder(Error::InvalidInput(e)) => e.code(),
            Self::Larder(Error::NotFound(_)) => "not_found",
            Self::Larder(Error::DuplicateId(_)) => "duplicate_id",
            Self::Larder(_) => "backend_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidBody(_) | Self::Larder(Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Larder(Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Larder(Error::DuplicateId(_)) => StatusCode::CONFLICT,
            Self::Larder(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }
        (status, axum::Json(ErrorBody { error: self.code() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::InvalidBody("eof".into()), 400, "invalid_body"),
            (
                ApiError::from(Error::from(InputError::InvalidTags)),
                400,
                "invalid_tags",
            ),
            (ApiError::from(Error::NotFound("x".into())), 404, "not_found"),
            (ApiError::from(Error::DuplicateId("x".into())), 409, "duplicate_id"),
            (
                ApiError::from(Error::BackendUnavailable("down".into())),
                500,
                "backend_unavailable",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code().as_u16(), status);
            assert_eq!(err.code(), code);
        }
    }
}
