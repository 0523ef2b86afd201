use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::errors::DbError;

/// Every failure leaves the API as `{ "error": message }` with a matching status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Db(#[from] DbError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Http { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            Self::Db(err) => match err {
                DbError::InvalidDocument(_) | DbError::Json(_) => StatusCode::BAD_REQUEST,
                DbError::InvalidTable(_) | DbError::NoSuchDocument(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Http { status: StatusCode::INTERNAL_SERVER_ERROR, message: format!("store task failed: {err}") }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            log::error!("{status}: {message}");
        } else {
            log::debug!("{status}: {message}");
        }
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
