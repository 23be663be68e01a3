//! Server-side sessions and the MediaWiki cookie relay.
//!
//! The browser only ever sees an opaque random token in the `agapedia.sid`
//! cookie. Stores key records by the SHA-256 of that token, so a leaked store
//! cannot be replayed as cookies. A session record carries the logged-in user
//! and the MediaWiki cookies that are replayed on every upstream call.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgSessionStore;

use async_trait::async_trait;
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::mediawiki::{UserInfo, WikiCookies};

pub const SESSION_COOKIE_NAME: &str = "agapedia.sid";
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to generate session token: {0}")]
    Token(#[from] rand::Error),

    #[error("session store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Lookup key of a session: the hashed cookie token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        let digest = Sha256::digest(token.as_bytes());
        Self(Base64UrlUnpadded::encode_string(&digest))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Create a new session token for the cookie.
///
/// # Errors
/// Returns an error if the OS random number generator fails.
pub fn generate_session_token() -> Result<String, SessionError> {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// The user object handed to the client and kept in the session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: u64,
    pub username: String,
    pub groups: Vec<String>,
    pub rights: Vec<String>,
    pub user_info: UserInfo,
    pub is_admin: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
    #[serde(default, rename = "mediawikiCookies")]
    pub wiki_cookies: WikiCookies,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// A live session, `None` when unknown or expired.
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionData>, SessionError>;

    /// Insert or replace a session, expiring `ttl` from now.
    async fn save(
        &self,
        key: &SessionKey,
        data: &SessionData,
        ttl: Duration,
    ) -> Result<(), SessionError>;

    async fn destroy(&self, key: &SessionKey) -> Result<(), SessionError>;

    /// Drop expired sessions and return how many were removed.
    async fn prune_expired(&self) -> Result<u64, SessionError>;

    async fn ping(&self) -> Result<(), SessionError>;
}

/// Cookie attributes for the session cookie.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    ttl: Duration,
    secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SESSION_TTL,
            secure: false,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new(ttl: Duration, secure: bool) -> Self {
        Self { ttl, secure }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// `Set-Cookie` value carrying a fresh session token.
    ///
    /// # Errors
    /// Returns an error if the token contains bytes not allowed in a header.
    pub fn session_cookie(&self, token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
        let ttl_seconds = self.ttl.as_secs();
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }

    /// `Set-Cookie` value that removes the session cookie.
    ///
    /// # Errors
    /// Never fails in practice; the value is a constant.
    pub fn clear_session_cookie(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut cookie =
            format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
        if self.secure {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// Session token from the request's `Cookie` headers.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Periodically remove expired sessions until the runtime shuts down.
pub fn spawn_pruner(store: Arc<dyn SessionStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            match store.prune_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "pruned expired sessions"),
                Err(err) => error!("Failed to prune sessions: {err}"),
            }
        }
    })
}
