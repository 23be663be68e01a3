use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::IntoResponse,
    Json,
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{LoginRequest, LoginResponse};
use crate::{
    api::{
        payload::{non_empty, Payload},
        state::CurrentSession,
        ApiError, AppState,
    },
    mediawiki::{
        auth::{authenticate_user, is_blocked},
        Credentials,
    },
    session::{generate_session_token, SessionData, SessionKey, SessionUser},
};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; sets the session cookie", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "MediaWiki rejected the credentials"),
        (status = 403, description = "The account is blocked")
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    Payload(request): Payload<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(username), Some(password)) =
        (non_empty(request.username), non_empty(request.password))
    else {
        return Err(ApiError::BadRequest("Username and password are required"));
    };

    let credentials = Credentials {
        username,
        password: SecretString::from(password),
    };
    let authenticated = authenticate_user(state.wiki(), &credentials).await?;

    if is_blocked(&authenticated.user_info) {
        warn!(username = %authenticated.username, "blocked user tried to log in");
        return Err(ApiError::Forbidden("User account is blocked"));
    }

    let is_admin = authenticated.is_admin();
    let user = SessionUser {
        id: authenticated.user_info.id,
        username: authenticated.username,
        groups: authenticated.groups,
        rights: authenticated.rights,
        user_info: authenticated.user_info,
        is_admin,
    };

    // Always a fresh token, so a pre-login session id is never promoted.
    let token = generate_session_token()?;
    let session = CurrentSession {
        key: SessionKey::from_token(&token),
        data: SessionData {
            user: Some(user.clone()),
            wiki_cookies: authenticated.cookies,
        },
    };
    state.save_session(&session).await?;

    let cookie = state
        .session_config()
        .session_cookie(&token)
        .map_err(|err| ApiError::Internal(format!("Session creation failed: {err}")))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);

    info!(username = %user.username, is_admin, "user logged in");

    Ok((
        headers,
        Json(LoginResponse {
            user,
            is_authenticated: true,
            message: "Login successful".to_string(),
        }),
    ))
}
