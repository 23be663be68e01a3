//! Login and session checks built on top of [`WikiApi`].

use tracing::{instrument, warn};

use super::{Credentials, UserInfo, WikiApi, WikiCookies, WikiError};

/// MediaWiki group that grants gateway admin access.
pub const ADMIN_GROUP: &str = "sysop";

/// A user who just logged in, with everything the session needs to remember.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub username: String,
    pub cookies: WikiCookies,
    pub user_info: UserInfo,
    pub groups: Vec<String>,
    pub rights: Vec<String>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        is_admin(&self.groups)
    }
}

/// Log in and resolve the user's info, groups and rights with the new cookies.
///
/// # Errors
/// Returns [`WikiError::LoginRejected`] for bad credentials and any upstream failure as is.
#[instrument(skip_all, fields(username = %credentials.username))]
pub async fn authenticate_user(
    wiki: &dyn WikiApi,
    credentials: &Credentials,
) -> Result<AuthenticatedUser, WikiError> {
    let outcome = wiki.login(credentials).await?;
    let user_info = wiki.user_info(&outcome.cookies).await?;
    let rights = wiki
        .user_rights(&outcome.username, &outcome.cookies)
        .await?
        .unwrap_or_default();

    Ok(AuthenticatedUser {
        username: outcome.username,
        cookies: outcome.cookies,
        user_info,
        groups: rights.groups,
        rights: rights.rights,
    })
}

/// `Some(info)` while the MediaWiki session behind `cookies` is still logged in.
pub async fn validate_session(wiki: &dyn WikiApi, cookies: &WikiCookies) -> Option<UserInfo> {
    match wiki.user_info(cookies).await {
        Ok(info) if info.id > 0 => Some(info),
        Ok(_) => None,
        Err(err) => {
            warn!("Session validation failed: {err}");
            None
        }
    }
}

#[must_use]
pub fn is_admin(groups: &[String]) -> bool {
    groups.iter().any(|group| group == ADMIN_GROUP)
}

#[must_use]
pub fn is_blocked(user_info: &UserInfo) -> bool {
    user_info.blockid.is_some()
}
