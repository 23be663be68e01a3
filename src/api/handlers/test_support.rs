//! Router harness for handler tests: a fake wiki behind the real router.

use anyhow::{anyhow, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Method, Request, Response,
    },
    Router,
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

use crate::{
    api::{rate_limit::RateLimiter, router, AppState},
    mediawiki::fake::FakeWiki,
    session::{MemoryStore, SessionConfig, SESSION_COOKIE_NAME},
};

pub(crate) struct TestApp {
    pub wiki: Arc<FakeWiki>,
    pub sessions: Arc<MemoryStore>,
    router: Router,
}

pub(crate) fn default_wiki() -> FakeWiki {
    FakeWiki::new()
        .with_account("Admin", "adminpass", &["*", "user", "autoconfirmed", "sysop"])
        .with_account("Alice", "alicepass", &["*", "user"])
        .with_account("Nobody", "nobodypass", &[])
        .with_blocked_account("Troll", "trollpass")
        .with_page("Main Page", "Welcome to [[Agapedia]] and [[Missing page]].")
        .with_page("Agapedia", "Agapedia is a free encyclopedia.")
        .with_bare_page("Blank", "")
}

impl TestApp {
    pub(crate) fn new() -> Self {
        Self::with_limiter(RateLimiter::default())
    }

    pub(crate) fn with_limiter(limiter: RateLimiter) -> Self {
        let wiki = Arc::new(default_wiki());
        let sessions = Arc::new(MemoryStore::new());
        let state = AppState::new(wiki.clone(), sessions.clone())
            .with_session_config(SessionConfig::new(Duration::from_secs(3600), false));
        let router = router(Arc::new(state), Arc::new(limiter), None)
            .unwrap_or_else(|err| panic!("test router: {err}"));
        Self {
            wiki,
            sessions,
            router,
        }
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        uri: &str,
        session: Option<&str>,
        body: Option<Value>,
    ) -> Result<Response<Body>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = session {
            builder = builder.header(COOKIE, format!("{SESSION_COOKIE_NAME}={token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.oneshot(request).await
    }

    pub(crate) async fn oneshot(&self, request: Request<Body>) -> Result<Response<Body>> {
        Ok(self.router.clone().oneshot(request).await?)
    }

    pub(crate) async fn get(&self, uri: &str, session: Option<&str>) -> Result<Response<Body>> {
        self.send(Method::GET, uri, session, None).await
    }

    /// Log in through the API and return the session token from `Set-Cookie`.
    pub(crate) async fn login(&self, username: &str, password: &str) -> Result<String> {
        let response = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": password })),
            )
            .await?;
        session_token(&response).ok_or_else(|| anyhow!("login for {username} set no session"))
    }
}

/// Token carried by the response's session `Set-Cookie`, if any.
pub(crate) fn session_token(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) async fn json_body(response: Response<Body>) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
