use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error};

use super::types::{MeResponse, NotAuthenticated};
use crate::{
    api::{ApiError, AppState},
    mediawiki::{
        auth::{is_admin, validate_session},
        WikiCookies,
    },
};

fn not_authenticated(error: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(NotAuthenticated {
            error: error.to_string(),
            is_authenticated: false,
        }),
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user, refreshed from MediaWiki", body = MeResponse),
        (status = 401, description = "No session, or the MediaWiki session expired", body = NotAuthenticated)
    ),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Result<Response, ApiError> {
    let Some(mut session) = state.current_session(&headers).await? else {
        return Ok(not_authenticated("Not authenticated"));
    };
    let Some(mut user) = session.data.user.clone() else {
        return Ok(not_authenticated("Not authenticated"));
    };

    let Some(user_info) = validate_session(state.wiki(), &session.data.wiki_cookies).await else {
        debug!(username = %user.username, "MediaWiki session expired");
        session.data.user = None;
        session.data.wiki_cookies = WikiCookies::new();
        state.save_session(&session).await?;
        return Ok(not_authenticated("Session expired"));
    };

    match state
        .wiki()
        .user_rights(&user.username, &session.data.wiki_cookies)
        .await
    {
        Ok(rights) => {
            if let Some(rights) = rights {
                user.groups = rights.groups;
                user.rights = rights.rights;
            }
            user.is_admin = is_admin(&user.groups);
            user.user_info = user_info;
            session.data.user = Some(user.clone());
            state.save_session(&session).await?;
        }
        Err(err) => error!("Failed to refresh user rights: {err}"),
    }

    Ok(Json(MeResponse {
        user,
        is_authenticated: true,
    })
    .into_response())
}
