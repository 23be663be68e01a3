use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the MediaWiki Action API.
#[derive(Debug, Error)]
pub enum WikiError {
    #[error("Invalid MediaWiki API URL: {0}")]
    Config(String),

    #[error("MediaWiki API request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("MediaWiki API error: {status}")]
    Http { status: StatusCode },

    #[error("MediaWiki API error: {info} (code: {code})")]
    Api { code: String, info: String },

    #[error("Failed to decode MediaWiki API response: {0}")]
    Decode(String),

    #[error("MediaWiki did not return a {0} token")]
    MissingToken(&'static str),

    #[error("Login failed: {}", reason.as_deref().unwrap_or(result))]
    LoginRejected {
        result: String,
        reason: Option<String>,
    },

    #[error("Edit failed: {result}")]
    EditRejected { result: String },
}

impl WikiError {
    /// MediaWiki error code when the API itself rejected the call.
    #[must_use]
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub(crate) fn decode(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Decode(format!("{context}: {err}"))
    }
}
