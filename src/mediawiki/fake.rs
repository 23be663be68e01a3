//! In-memory stand-in for a MediaWiki installation, used by unit tests.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};

use super::{
    BlockRequest, BlockResult, Credentials, EditOutcome, LoginOutcome, PageContent, PageEdit,
    PageLink, PageSummary, ParsedPage, Revision, RightsChange, RightsChangeRequest, SearchHit,
    UserInfo, UserRights, WikiApi, WikiCookies, WikiError, WikiUser,
};

pub(crate) const SESSION_COOKIE: &str = "fakewiki_session";

struct Account {
    id: u64,
    password: String,
    groups: Vec<String>,
    rights: Vec<String>,
    blocked: bool,
    logged_in: bool,
}

struct Page {
    pageid: u64,
    revisions: Vec<(Revision, String)>,
}

#[derive(Default)]
pub(crate) struct FakeWiki {
    accounts: Mutex<BTreeMap<String, Account>>,
    pages: Mutex<BTreeMap<String, Page>>,
    bare_pages: Mutex<BTreeMap<String, String>>,
    blocks: Mutex<Vec<BlockRequest>>,
    logouts: Mutex<Vec<WikiCookies>>,
    seen_cookies: Mutex<Vec<WikiCookies>>,
    next_id: AtomicU64,
    failing: AtomicBool,
    down: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl FakeWiki {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn with_account(self, name: &str, password: &str, groups: &[&str]) -> Self {
        let id = self.next_id();
        lock(&self.accounts).insert(
            name.to_string(),
            Account {
                id,
                password: password.to_string(),
                groups: groups.iter().map(ToString::to_string).collect(),
                rights: vec!["read".to_string(), "edit".to_string()],
                blocked: false,
                logged_in: false,
            },
        );
        self
    }

    pub(crate) fn with_blocked_account(self, name: &str, password: &str) -> Self {
        let wiki = self.with_account(name, password, &["*", "user"]);
        if let Some(account) = lock(&wiki.accounts).get_mut(name) {
            account.blocked = true;
        }
        wiki
    }

    pub(crate) fn with_page(self, title: &str, content: &str) -> Self {
        self.store_revision(title, content, "Admin", "");
        self
    }

    /// A page whose content comes back without any revision metadata.
    pub(crate) fn with_bare_page(self, title: &str, content: &str) -> Self {
        lock(&self.bare_pages).insert(title.to_string(), content.to_string());
        self
    }

    /// Make every call but `ping` fail with an API error.
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make `ping` fail.
    pub(crate) fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Log every account out, as if MediaWiki's own sessions expired.
    pub(crate) fn expire_sessions(&self) {
        for account in lock(&self.accounts).values_mut() {
            account.logged_in = false;
        }
    }

    pub(crate) fn groups_of(&self, name: &str) -> Option<Vec<String>> {
        lock(&self.accounts).get(name).map(|account| account.groups.clone())
    }

    pub(crate) fn has_page(&self, title: &str) -> bool {
        lock(&self.pages).contains_key(title)
    }

    pub(crate) fn blocks(&self) -> Vec<BlockRequest> {
        lock(&self.blocks).clone()
    }

    pub(crate) fn logouts(&self) -> usize {
        lock(&self.logouts).len()
    }

    /// Cookie jars received by every call, in order.
    pub(crate) fn seen_cookies(&self) -> Vec<WikiCookies> {
        lock(&self.seen_cookies).clone()
    }

    /// Cookies of a logged-in session for `name`.
    pub(crate) fn session_cookies(name: &str) -> WikiCookies {
        let mut cookies = WikiCookies::new();
        cookies.insert(SESSION_COOKIE, name);
        cookies
    }

    fn enter(&self, cookies: &WikiCookies) -> Result<(), WikiError> {
        lock(&self.seen_cookies).push(cookies.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(WikiError::Api {
                code: "internal_api_error_DBQueryError".to_string(),
                info: "A database query error has occurred.".to_string(),
            });
        }
        Ok(())
    }

    fn store_revision(&self, title: &str, content: &str, user: &str, comment: &str) -> EditOutcome {
        let revid = self.next_id();
        let mut pages = lock(&self.pages);
        let page = pages.entry(title.to_string()).or_insert_with(|| Page {
            pageid: revid,
            revisions: Vec::new(),
        });
        if page.revisions.last().is_some_and(|(_, text)| text == content) {
            return EditOutcome {
                title: title.to_string(),
                newrevid: None,
                nochange: true,
            };
        }
        let parentid = page.revisions.last().map_or(0, |(revision, _)| revision.revid);
        page.revisions.push((
            Revision {
                revid,
                parentid: Some(parentid),
                timestamp: Some("2024-01-01T00:00:00Z".to_string()),
                user: Some(user.to_string()),
                comment: Some(comment.to_string()),
                size: Some(content.len() as u64),
            },
            content.to_string(),
        ));
        EditOutcome {
            title: title.to_string(),
            newrevid: Some(revid),
            nochange: false,
        }
    }

    fn session_user(&self, cookies: &WikiCookies) -> Option<String> {
        let name = cookies.get(SESSION_COOKIE)?;
        lock(&self.accounts)
            .get(name)
            .filter(|account| account.logged_in)
            .map(|_| name.to_string())
    }

    fn require_session(&self, cookies: &WikiCookies) -> Result<String, WikiError> {
        self.session_user(cookies).ok_or_else(|| WikiError::Api {
            code: "permissiondenied".to_string(),
            info: "You don't have permission to do this.".to_string(),
        })
    }
}

#[async_trait]
impl WikiApi for FakeWiki {
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, WikiError> {
        self.enter(&WikiCookies::new())?;
        let mut accounts = lock(&self.accounts);
        match accounts.get_mut(&credentials.username) {
            Some(account) if account.password == credentials.password.expose_secret() => {
                account.logged_in = true;
                Ok(LoginOutcome {
                    username: credentials.username.clone(),
                    cookies: Self::session_cookies(&credentials.username),
                })
            }
            _ => Err(WikiError::LoginRejected {
                result: "Failed".to_string(),
                reason: Some("Incorrect username or password entered.".to_string()),
            }),
        }
    }

    async fn logout(&self, cookies: &WikiCookies) -> Result<(), WikiError> {
        self.enter(cookies)?;
        lock(&self.logouts).push(cookies.clone());
        if let Some(name) = self.session_user(cookies) {
            if let Some(account) = lock(&self.accounts).get_mut(&name) {
                account.logged_in = false;
            }
        }
        Ok(())
    }

    async fn csrf_token(&self, cookies: &WikiCookies) -> Result<String, WikiError> {
        self.enter(cookies)?;
        Ok(if self.session_user(cookies).is_some() {
            "fake-token+\\".to_string()
        } else {
            "+\\".to_string()
        })
    }

    async fn page_content(
        &self,
        title: &str,
        cookies: &WikiCookies,
    ) -> Result<Option<PageContent>, WikiError> {
        self.enter(cookies)?;
        if let Some(content) = lock(&self.bare_pages).get(title) {
            return Ok(Some(PageContent {
                title: title.to_string(),
                content: content.clone(),
                timestamp: None,
                user: None,
                comment: None,
                revid: None,
            }));
        }
        let pages = lock(&self.pages);
        Ok(pages.get(title).and_then(|page| {
            page.revisions.last().map(|(revision, content)| PageContent {
                title: title.to_string(),
                content: content.clone(),
                timestamp: revision.timestamp.clone(),
                user: revision.user.clone(),
                comment: revision.comment.clone(),
                revid: Some(revision.revid),
            })
        }))
    }

    async fn edit_page(
        &self,
        edit: &PageEdit,
        cookies: &WikiCookies,
    ) -> Result<EditOutcome, WikiError> {
        self.enter(cookies)?;
        let user = self.require_session(cookies)?;
        Ok(self.store_revision(&edit.title, &edit.text, &user, &edit.summary))
    }

    async fn delete_page(
        &self,
        title: &str,
        _reason: &str,
        cookies: &WikiCookies,
    ) -> Result<(), WikiError> {
        self.enter(cookies)?;
        self.require_session(cookies)?;
        lock(&self.pages)
            .remove(title)
            .map(|_| ())
            .ok_or_else(|| WikiError::Api {
                code: "missingtitle".to_string(),
                info: "The page you specified doesn't exist.".to_string(),
            })
    }

    async fn parse_wikitext(
        &self,
        text: &str,
        _title: &str,
        cookies: &WikiCookies,
    ) -> Result<ParsedPage, WikiError> {
        self.enter(cookies)?;
        let pages = lock(&self.pages);
        let links = text
            .split("[[")
            .skip(1)
            .filter_map(|rest| rest.split_once("]]"))
            .map(|(target, _)| PageLink {
                ns: 0,
                title: target.to_string(),
                exists: pages.contains_key(target),
            })
            .collect();
        Ok(ParsedPage {
            html: format!("<div class=\"mw-parser-output\"><p>{text}</p></div>"),
            links,
        })
    }

    async fn user_info(&self, cookies: &WikiCookies) -> Result<UserInfo, WikiError> {
        self.enter(cookies)?;
        let Some(name) = self.session_user(cookies) else {
            return Ok(UserInfo {
                name: "127.0.0.1".to_string(),
                anon: true,
                ..UserInfo::default()
            });
        };
        let accounts = lock(&self.accounts);
        let Some(account) = accounts.get(&name) else {
            return Ok(UserInfo::default());
        };
        Ok(UserInfo {
            id: account.id,
            name,
            blockid: account.blocked.then_some(99),
            blockedby: account.blocked.then(|| "Admin".to_string()),
            blockreason: account.blocked.then(|| "Vandalism".to_string()),
            blockexpiry: account.blocked.then(|| "infinite".to_string()),
            ..UserInfo::default()
        })
    }

    async fn block_user(
        &self,
        request: &BlockRequest,
        cookies: &WikiCookies,
    ) -> Result<BlockResult, WikiError> {
        self.enter(cookies)?;
        self.require_session(cookies)?;
        lock(&self.blocks).push(request.clone());
        if let Some(account) = lock(&self.accounts).get_mut(&request.user) {
            account.blocked = true;
        }
        Ok(json!({
            "user": request.user,
            "expiry": request.expiry,
            "reason": request.reason,
            "id": 99,
        }))
    }

    async fn user_rights(
        &self,
        username: &str,
        cookies: &WikiCookies,
    ) -> Result<Option<UserRights>, WikiError> {
        self.enter(cookies)?;
        Ok(lock(&self.accounts).get(username).map(|account| UserRights {
            groups: account.groups.clone(),
            rights: account.rights.clone(),
        }))
    }

    async fn set_user_rights(
        &self,
        request: &RightsChangeRequest,
        cookies: &WikiCookies,
    ) -> Result<RightsChange, WikiError> {
        self.enter(cookies)?;
        self.require_session(cookies)?;
        let mut accounts = lock(&self.accounts);
        let account = accounts.get_mut(&request.user).ok_or_else(|| WikiError::Api {
            code: "nosuchuser".to_string(),
            info: format!("The user \"{}\" does not exist.", request.user),
        })?;

        let mut added = Vec::new();
        for group in &request.add {
            if !account.groups.contains(group) {
                account.groups.push(group.clone());
                added.push(group.clone());
            }
        }
        let mut removed = Vec::new();
        for group in &request.remove {
            if account.groups.contains(group) {
                account.groups.retain(|existing| existing != group);
                removed.push(group.clone());
            }
        }

        Ok(RightsChange {
            user: request.user.clone(),
            added,
            removed,
        })
    }

    async fn list_pages(
        &self,
        from: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<PageSummary>, WikiError> {
        self.enter(cookies)?;
        Ok(lock(&self.pages)
            .range(from.to_string()..)
            .take(limit as usize)
            .map(|(title, page)| PageSummary {
                pageid: page.pageid,
                ns: 0,
                title: title.clone(),
            })
            .collect())
    }

    async fn search_pages(
        &self,
        query: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<SearchHit>, WikiError> {
        self.enter(cookies)?;
        let needle = query.to_lowercase();
        Ok(lock(&self.pages)
            .iter()
            .filter_map(|(title, page)| {
                let (_, content) = page.revisions.last()?;
                let matches = title.to_lowercase().contains(&needle)
                    || content.to_lowercase().contains(&needle);
                matches.then(|| SearchHit {
                    ns: 0,
                    title: title.clone(),
                    pageid: page.pageid,
                    size: Some(content.len() as u64),
                    wordcount: Some(content.split_whitespace().count() as u64),
                    snippet: content.chars().take(40).collect(),
                    timestamp: Some("2024-01-01T00:00:00Z".to_string()),
                })
            })
            .take(limit as usize)
            .collect())
    }

    async fn list_users(
        &self,
        from: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<WikiUser>, WikiError> {
        self.enter(cookies)?;
        Ok(lock(&self.accounts)
            .range(from.to_string()..)
            .take(limit as usize)
            .map(|(name, account)| WikiUser {
                userid: account.id,
                name: name.clone(),
                groups: account.groups.clone(),
                rights: account.rights.clone(),
                editcount: 0,
            })
            .collect())
    }

    async fn revision_history(
        &self,
        title: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<Revision>, WikiError> {
        self.enter(cookies)?;
        Ok(lock(&self.pages)
            .get(title)
            .map(|page| {
                page.revisions
                    .iter()
                    .take(limit as usize)
                    .map(|(revision, _)| revision.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), WikiError> {
        if self.down.load(Ordering::SeqCst) {
            Err(WikiError::Http {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            })
        } else {
            Ok(())
        }
    }
}
