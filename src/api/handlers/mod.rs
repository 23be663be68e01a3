//! Route handlers for the `/api` surface.

pub mod articles;
pub mod auth;
pub mod health;
pub mod root;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;

use axum::response::IntoResponse;
use serde::Deserialize;
use utoipa::IntoParams;

use super::ApiError;

/// `from`/`limit` query shared by the listing routes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Title or username to start listing from.
    pub from: Option<String>,
    pub limit: Option<String>,
}

impl ListQuery {
    pub(crate) fn from(&self) -> &str {
        self.from.as_deref().unwrap_or_default()
    }

    pub(crate) fn limit(&self, default: u32) -> u32 {
        parse_limit(self.limit.as_deref(), default)
    }
}

/// Missing, unparsable or zero limits fall back to `default`.
pub(crate) fn parse_limit(value: Option<&str>, default: u32) -> u32 {
    value
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(default)
}

/// Fallback for unknown `/api` paths.
pub async fn not_found() -> impl IntoResponse {
    ApiError::NotFound("Not found")
}
