//! Records returned by the Action API adapter.
//!
//! Field names follow MediaWiki's own (`revid`, `pageid`, ...) so handlers can
//! rename them explicitly for the client.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::WikiCookies;

#[derive(Clone, Debug)]
pub struct LoginOutcome {
    pub username: String,
    /// Cookies of the authenticated MediaWiki session.
    pub cookies: WikiCookies,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageContent {
    pub title: String,
    pub content: String,
    pub timestamp: Option<String>,
    pub user: Option<String>,
    pub comment: Option<String>,
    pub revid: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct PageEdit {
    pub title: String,
    pub text: String,
    pub summary: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditOutcome {
    pub title: String,
    /// Absent when MediaWiki reports `nochange`.
    pub newrevid: Option<u64>,
    pub nochange: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageLink {
    pub ns: i64,
    pub title: String,
    #[serde(default)]
    pub exists: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPage {
    pub html: String,
    pub links: Vec<PageLink>,
}

/// `meta=userinfo` for the session's user; `id == 0` means anonymous.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub anon: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockedby: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockreason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockexpiry: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserRights {
    pub groups: Vec<String>,
    pub rights: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct BlockRequest {
    pub user: String,
    pub reason: String,
    pub expiry: String,
}

#[derive(Clone, Debug)]
pub struct RightsChangeRequest {
    pub user: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RightsChange {
    pub user: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PageSummary {
    pub pageid: u64,
    #[serde(default)]
    pub ns: i64,
    pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub ns: i64,
    pub title: String,
    pub pageid: u64,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub wordcount: Option<u64>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct WikiUser {
    pub userid: u64,
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub rights: Vec<String>,
    #[serde(default)]
    pub editcount: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Revision {
    pub revid: u64,
    #[serde(default)]
    pub parentid: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Credentials handed to [`super::WikiApi::login`].
#[derive(Clone, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// `action=block` result, passed to the client untouched.
pub type BlockResult = Value;
