use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shorturl_core::ShortenerError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unable to decode body: {0}")]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
    #[error("Operation is not supported")]
    Unsupported,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Body(_) | AppError::Unsupported => StatusCode::BAD_REQUEST,
            AppError::Shortener(ShortenerError::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
            AppError::Shortener(ShortenerError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Shortener(ShortenerError::BatchConflict(_)) => StatusCode::CONFLICT,
            AppError::Shortener(ShortenerError::Storage { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shorturl_core::StorageError;

    #[test]
    fn status_mapping() {
        let cases = [
            (ShortenerError::InvalidUrl("x".into()), StatusCode::BAD_REQUEST),
            (ShortenerError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ShortenerError::BatchConflict("x".into()), StatusCode::CONFLICT),
            (
                ShortenerError::storage("ping", StorageError::Timeout("3s".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
        assert_eq!(AppError::Unsupported.status(), StatusCode::BAD_REQUEST);
    }
}
