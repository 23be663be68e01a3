//! MediaWiki cookie jar carried inside the gateway session.
//!
//! MediaWiki identifies a logged-in user by its own session cookies
//! (`<wiki>_session`, `<wiki>UserID`, `<wiki>UserName`, ...). The gateway keeps
//! them per browser session and replays them on every Action API call.

use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value MediaWiki writes when it expires a cookie.
const DELETED_MARKER: &str = "deleted";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WikiCookies(BTreeMap<String, String>);

impl WikiCookies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Render the jar as a `Cookie` request header, `None` when empty.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        if self.0.is_empty() {
            return None;
        }
        Some(
            self.0
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Apply a single `Set-Cookie` header value.
    ///
    /// Attributes after the first `;` are ignored. An empty or `deleted` value
    /// drops the cookie from the jar.
    pub fn absorb(&mut self, set_cookie: &str) {
        let pair = set_cookie.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            return;
        }
        if value.is_empty() || value == DELETED_MARKER {
            self.0.remove(name);
        } else {
            self.0.insert(name.to_string(), value.to_string());
        }
    }

    /// Apply every `Set-Cookie` header of an upstream response.
    pub fn absorb_headers(&mut self, headers: &HeaderMap<HeaderValue>) {
        for value in headers.get_all(SET_COOKIE) {
            if let Ok(value) = value.to_str() {
                self.absorb(value);
            }
        }
    }

    /// Overlay `newer` on top of this jar; newer values win.
    pub fn merge(&mut self, newer: &Self) {
        for (name, value) in &newer.0 {
            self.0.insert(name.clone(), value.clone());
        }
    }
}
