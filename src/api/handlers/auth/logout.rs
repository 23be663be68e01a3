use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, warn};

use super::types::MessageResponse;
use crate::{
    api::AppState,
    session::{extract_session_token, SessionKey},
};

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session destroyed and cookie cleared", body = MessageResponse)
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    if let Some(token) = extract_session_token(&headers) {
        let key = SessionKey::from_token(&token);
        match state.sessions().load(&key).await {
            Ok(Some(session)) if !session.wiki_cookies.is_empty() => {
                if let Err(err) = state.wiki().logout(&session.wiki_cookies).await {
                    warn!("MediaWiki logout failed: {err}");
                }
            }
            Ok(_) => {}
            Err(err) => error!("Failed to load session: {err}"),
        }
        if let Err(err) = state.sessions().destroy(&key).await {
            error!("Failed to delete session: {err}");
        }
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = state.session_config().clear_session_cookie() {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (
        response_headers,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}
