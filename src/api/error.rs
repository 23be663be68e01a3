use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::{mediawiki::WikiError, session::SessionError};

/// Errors a handler can answer with; every variant renders as `{"error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{error}")]
    NotImplemented {
        error: &'static str,
        message: &'static str,
    },

    #[error("Too many requests, please try again later.")]
    TooManyRequests { retry_after: Duration },

    #[error(transparent)]
    Wiki(#[from] WikiError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) | Self::Wiki(WikiError::LoginRejected { .. }) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotImplemented { .. } => StatusCode::NOT_IMPLEMENTED,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Wiki(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Wiki(WikiError::LoginRejected { .. }) => "Invalid credentials".to_string(),
            Self::Session(_) => "Session store unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {self}");
        }
        let message = self.message();

        match self {
            Self::NotImplemented { error, message } => {
                (status, Json(json!({ "error": error, "message": message }))).into_response()
            }
            Self::TooManyRequests { retry_after } => {
                let mut response = (status, Json(json!({ "error": message }))).into_response();
                let seconds = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                if let Ok(value) = HeaderValue::from_str(&seconds.max(1).to_string()) {
                    response.headers_mut().insert(RETRY_AFTER, value);
                }
                response
            }
            _ => (status, Json(json!({ "error": message }))).into_response(),
        }
    }
}
