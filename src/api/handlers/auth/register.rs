use axum::response::IntoResponse;

use crate::api::ApiError;

/// Accounts are created through MediaWiki itself.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    responses(
        (status = 501, description = "Registration is not available through the API")
    ),
    tag = "auth"
)]
pub async fn register() -> impl IntoResponse {
    ApiError::NotImplemented {
        error: "User registration via API is not supported",
        message: "Please create an account through the MediaWiki web interface",
    }
}
