//! MediaWiki Action API adapter.
//!
//! Every operation here is a single Action API round trip (plus a token fetch
//! for writes). Nothing is cached: login and CSRF tokens are requested right
//! before the call that needs them, and the caller's MediaWiki cookies are
//! replayed on every request so the wiki acts as that user.
//!
//! Requests always use `format=json&formatversion=2`, so page sets come back as
//! arrays and boolean flags (`missing`, `anon`, ...) as real booleans.

pub mod auth;
mod client;
mod config;
mod cookies;
mod error;
#[cfg(test)]
pub(crate) mod fake;
mod types;

pub use client::MediaWikiClient;
pub use config::{MediaWikiConfig, DEFAULT_API_PATH, DEFAULT_BASE_URL};
pub use cookies::WikiCookies;
pub use error::WikiError;
pub use types::{
    BlockRequest, BlockResult, Credentials, EditOutcome, LoginOutcome, PageContent, PageEdit,
    PageLink, PageSummary, ParsedPage, Revision, RightsChange, RightsChangeRequest, SearchHit,
    UserInfo, UserRights, WikiUser,
};

use async_trait::async_trait;

/// Operations the gateway forwards to MediaWiki.
///
/// `cookies` is the caller's MediaWiki cookie jar; pass an empty jar for
/// anonymous access.
#[async_trait]
pub trait WikiApi: Send + Sync {
    /// `action=login` with a freshly fetched login token.
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, WikiError>;

    /// `action=logout`, ending the MediaWiki session behind `cookies`.
    async fn logout(&self, cookies: &WikiCookies) -> Result<(), WikiError>;

    /// `meta=tokens&type=csrf`, required before every write.
    async fn csrf_token(&self, cookies: &WikiCookies) -> Result<String, WikiError>;

    /// Latest revision of a page, `None` when it does not exist.
    async fn page_content(
        &self,
        title: &str,
        cookies: &WikiCookies,
    ) -> Result<Option<PageContent>, WikiError>;

    async fn edit_page(
        &self,
        edit: &PageEdit,
        cookies: &WikiCookies,
    ) -> Result<EditOutcome, WikiError>;

    async fn delete_page(
        &self,
        title: &str,
        reason: &str,
        cookies: &WikiCookies,
    ) -> Result<(), WikiError>;

    async fn parse_wikitext(
        &self,
        text: &str,
        title: &str,
        cookies: &WikiCookies,
    ) -> Result<ParsedPage, WikiError>;

    async fn user_info(&self, cookies: &WikiCookies) -> Result<UserInfo, WikiError>;

    async fn block_user(
        &self,
        request: &BlockRequest,
        cookies: &WikiCookies,
    ) -> Result<BlockResult, WikiError>;

    /// Groups and rights of a named user, `None` when the user is unknown.
    async fn user_rights(
        &self,
        username: &str,
        cookies: &WikiCookies,
    ) -> Result<Option<UserRights>, WikiError>;

    async fn set_user_rights(
        &self,
        request: &RightsChangeRequest,
        cookies: &WikiCookies,
    ) -> Result<RightsChange, WikiError>;

    async fn list_pages(
        &self,
        from: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<PageSummary>, WikiError>;

    async fn search_pages(
        &self,
        query: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<SearchHit>, WikiError>;

    async fn list_users(
        &self,
        from: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<WikiUser>, WikiError>;

    /// Oldest-first revision list; empty for a missing page.
    async fn revision_history(
        &self,
        title: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<Revision>, WikiError>;

    /// Cheap `meta=siteinfo` round trip for health reporting.
    async fn ping(&self) -> Result<(), WikiError>;
}
