use axum::http::HeaderMap;
use std::sync::Arc;

use super::ApiError;
use crate::{
    mediawiki::{auth::is_admin, WikiApi, WikiCookies},
    session::{
        extract_session_token, SessionConfig, SessionData, SessionKey, SessionStore, SessionUser,
    },
};

pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Shared handler state, injected as `Extension<Arc<AppState>>`.
pub struct AppState {
    wiki: Arc<dyn WikiApi>,
    sessions: Arc<dyn SessionStore>,
    session_config: SessionConfig,
    frontend_url: String,
}

impl AppState {
    #[must_use]
    pub fn new(wiki: Arc<dyn WikiApi>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            wiki,
            sessions,
            session_config: SessionConfig::default(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
        }
    }

    #[must_use]
    pub fn with_session_config(mut self, session_config: SessionConfig) -> Self {
        self.session_config = session_config;
        self
    }

    #[must_use]
    pub fn with_frontend_url(mut self, frontend_url: String) -> Self {
        self.frontend_url = frontend_url;
        self
    }

    #[must_use]
    pub fn wiki(&self) -> &dyn WikiApi {
        self.wiki.as_ref()
    }

    #[must_use]
    pub fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    #[must_use]
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.sessions)
    }

    #[must_use]
    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    #[must_use]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    /// The caller's session, if the cookie names a live one.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn current_session(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<CurrentSession>, ApiError> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(None);
        };
        let key = SessionKey::from_token(&token);
        let data = self.sessions.load(&key).await?;
        Ok(data.map(|data| CurrentSession { key, data }))
    }

    /// MediaWiki cookies to relay for this request, empty when anonymous.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn wiki_cookies(&self, headers: &HeaderMap) -> Result<WikiCookies, ApiError> {
        Ok(self
            .current_session(headers)
            .await?
            .map(|session| session.data.wiki_cookies)
            .unwrap_or_default())
    }

    /// Persist a session under its key for another full TTL.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn save_session(&self, session: &CurrentSession) -> Result<(), ApiError> {
        self.sessions
            .save(&session.key, &session.data, self.session_config.ttl())
            .await?;
        Ok(())
    }
}

/// A loaded session together with the key it is stored under.
#[derive(Clone, Debug)]
pub struct CurrentSession {
    pub key: SessionKey,
    pub data: SessionData,
}

/// A request made by a logged-in user.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user: SessionUser,
    pub cookies: WikiCookies,
}

impl Principal {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        is_admin(&self.user.groups)
    }
}

/// Resolve the session user, or 401.
///
/// # Errors
/// Returns [`ApiError::Unauthorized`] without a logged-in session.
pub async fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let session = state.current_session(headers).await?;
    match session {
        Some(CurrentSession {
            data:
                SessionData {
                    user: Some(user),
                    wiki_cookies,
                },
            ..
        }) => Ok(Principal {
            user,
            cookies: wiki_cookies,
        }),
        _ => Err(ApiError::Unauthorized("Authentication required")),
    }
}

/// Resolve a session user in the `sysop` group, or 401/403.
///
/// # Errors
/// Returns [`ApiError::Forbidden`] for users outside the admin group.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let principal = require_auth(state, headers).await?;
    if principal.is_admin() {
        Ok(principal)
    } else {
        Err(ApiError::Forbidden("Admin access required"))
    }
}

/// Resolve a session user that belongs to at least one group, or 401/403.
///
/// # Errors
/// Returns [`ApiError::Forbidden`] for users without any group.
pub async fn require_user(state: &AppState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let principal = require_auth(state, headers).await?;
    if principal.user.groups.is_empty() {
        Err(ApiError::Forbidden("User access required"))
    } else {
        Ok(principal)
    }
}
