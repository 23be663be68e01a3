use async_trait::async_trait;
use reqwest::{header::COOKIE, Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{
    BlockRequest, BlockResult, Credentials, EditOutcome, LoginOutcome, MediaWikiConfig,
    PageContent, PageEdit, PageLink, PageSummary, ParsedPage, Revision, RightsChange,
    RightsChangeRequest, SearchHit, UserInfo, UserRights, WikiApi, WikiCookies, WikiError,
    WikiUser,
};

type Params<'a> = [(&'a str, String)];

/// Parsed Action API body plus any cookies the response set.
#[derive(Debug)]
struct ApiResponse {
    payload: Value,
    cookies: WikiCookies,
}

/// Async HTTP implementation of [`WikiApi`].
#[derive(Clone, Debug)]
pub struct MediaWikiClient {
    client: Client,
    api_url: Url,
}

impl MediaWikiClient {
    /// Build a client for the configured `api.php`.
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &MediaWikiConfig) -> Result<Self, WikiError> {
        let api_url = config.api_url()?;
        let client = Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.timeout())
            .build()
            .map_err(WikiError::Transport)?;

        Ok(Self { client, api_url })
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    async fn get(&self, params: &Params<'_>, cookies: &WikiCookies) -> Result<ApiResponse, WikiError> {
        let request = self
            .client
            .get(self.api_url.clone())
            .query(&request_pairs(params));
        self.send(request, cookies).await
    }

    async fn post(&self, params: &Params<'_>, cookies: &WikiCookies) -> Result<ApiResponse, WikiError> {
        let request = self
            .client
            .post(self.api_url.clone())
            .form(&request_pairs(params));
        self.send(request, cookies).await
    }

    async fn send(
        &self,
        request: RequestBuilder,
        cookies: &WikiCookies,
    ) -> Result<ApiResponse, WikiError> {
        let request = match cookies.header_value() {
            Some(header) => request.header(COOKIE, header),
            None => request,
        };

        let response = request.send().await.map_err(WikiError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(WikiError::Http { status });
        }

        let mut set_cookies = WikiCookies::new();
        set_cookies.absorb_headers(response.headers());

        let payload: Value = response
            .json()
            .await
            .map_err(|err| WikiError::decode("invalid JSON body", err))?;
        check_api_error(&payload)?;

        debug!(cookies_set = set_cookies.len(), "MediaWiki API call succeeded");

        Ok(ApiResponse {
            payload,
            cookies: set_cookies,
        })
    }

    async fn query(&self, params: &Params<'_>, cookies: &WikiCookies) -> Result<Value, WikiError> {
        let mut all = Vec::with_capacity(params.len() + 1);
        all.push(("action", "query".to_string()));
        all.extend(params.iter().cloned());
        Ok(self.get(&all, cookies).await?.payload)
    }
}

#[async_trait]
impl WikiApi for MediaWikiClient {
    #[instrument(skip_all, fields(username = %credentials.username))]
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, WikiError> {
        // The login token is bound to the anonymous session the token request
        // opens, so its cookies must ride along on the login POST.
        let token_response = self
            .get(
                &[
                    ("action", "query".to_string()),
                    ("meta", "tokens".to_string()),
                    ("type", "login".to_string()),
                ],
                &WikiCookies::new(),
            )
            .await?;
        let login_token = decode_token(&token_response.payload, TokenKind::Login)?;
        let mut cookies = token_response.cookies;

        let login_response = self
            .post(
                &[
                    ("action", "login".to_string()),
                    ("lgname", credentials.username.clone()),
                    (
                        "lgpassword",
                        credentials.password.expose_secret().to_string(),
                    ),
                    ("lgtoken", login_token),
                ],
                &cookies,
            )
            .await?;
        let username = decode_login(&login_response.payload)?;
        cookies.merge(&login_response.cookies);

        Ok(LoginOutcome {
            username: username.unwrap_or_else(|| credentials.username.clone()),
            cookies,
        })
    }

    async fn logout(&self, cookies: &WikiCookies) -> Result<(), WikiError> {
        let token = self.csrf_token(cookies).await?;
        self.post(
            &[("action", "logout".to_string()), ("token", token)],
            cookies,
        )
        .await?;
        Ok(())
    }

    async fn csrf_token(&self, cookies: &WikiCookies) -> Result<String, WikiError> {
        let payload = self
            .query(
                &[("meta", "tokens".to_string()), ("type", "csrf".to_string())],
                cookies,
            )
            .await?;
        decode_token(&payload, TokenKind::Csrf)
    }

    #[instrument(skip(self, cookies))]
    async fn page_content(
        &self,
        title: &str,
        cookies: &WikiCookies,
    ) -> Result<Option<PageContent>, WikiError> {
        let payload = self
            .query(
                &[
                    ("titles", title.to_string()),
                    ("prop", "revisions".to_string()),
                    ("rvprop", "content|timestamp|user|comment|ids".to_string()),
                    ("rvslots", "main".to_string()),
                ],
                cookies,
            )
            .await?;
        decode_page_content(&payload)
    }

    #[instrument(skip(self, edit, cookies), fields(title = %edit.title))]
    async fn edit_page(
        &self,
        edit: &PageEdit,
        cookies: &WikiCookies,
    ) -> Result<EditOutcome, WikiError> {
        let token = self.csrf_token(cookies).await?;
        let response = self
            .post(
                &[
                    ("action", "edit".to_string()),
                    ("title", edit.title.clone()),
                    ("text", edit.text.clone()),
                    ("summary", edit.summary.clone()),
                    ("bot", "1".to_string()),
                    ("token", token),
                ],
                cookies,
            )
            .await?;
        decode_edit(&response.payload)
    }

    #[instrument(skip(self, cookies))]
    async fn delete_page(
        &self,
        title: &str,
        reason: &str,
        cookies: &WikiCookies,
    ) -> Result<(), WikiError> {
        let token = self.csrf_token(cookies).await?;
        let response = self
            .post(
                &[
                    ("action", "delete".to_string()),
                    ("title", title.to_string()),
                    ("reason", reason.to_string()),
                    ("token", token),
                ],
                cookies,
            )
            .await?;
        if response.payload.get("delete").is_some() {
            Ok(())
        } else {
            Err(WikiError::Decode("Delete failed".to_string()))
        }
    }

    #[instrument(skip(self, text, cookies))]
    async fn parse_wikitext(
        &self,
        text: &str,
        title: &str,
        cookies: &WikiCookies,
    ) -> Result<ParsedPage, WikiError> {
        let response = self
            .post(
                &[
                    ("action", "parse".to_string()),
                    ("text", text.to_string()),
                    ("title", title.to_string()),
                    ("contentmodel", "wikitext".to_string()),
                    ("prop", "text|links".to_string()),
                ],
                cookies,
            )
            .await?;
        decode_parse(&response.payload)
    }

    async fn user_info(&self, cookies: &WikiCookies) -> Result<UserInfo, WikiError> {
        let payload = self
            .query(
                &[
                    ("meta", "userinfo".to_string()),
                    ("uiprop", "blockinfo|groups".to_string()),
                ],
                cookies,
            )
            .await?;
        decode_user_info(&payload)
    }

    #[instrument(skip(self, request, cookies), fields(user = %request.user))]
    async fn block_user(
        &self,
        request: &BlockRequest,
        cookies: &WikiCookies,
    ) -> Result<BlockResult, WikiError> {
        let token = self.csrf_token(cookies).await?;
        let response = self
            .post(
                &[
                    ("action", "block".to_string()),
                    ("user", request.user.clone()),
                    ("reason", request.reason.clone()),
                    ("expiry", request.expiry.clone()),
                    ("token", token),
                ],
                cookies,
            )
            .await?;
        response
            .payload
            .get("block")
            .cloned()
            .ok_or_else(|| WikiError::Decode("Block failed".to_string()))
    }

    async fn user_rights(
        &self,
        username: &str,
        cookies: &WikiCookies,
    ) -> Result<Option<UserRights>, WikiError> {
        let payload = self
            .query(
                &[
                    ("list", "users".to_string()),
                    ("ususers", username.to_string()),
                    ("usprop", "groups|rights".to_string()),
                ],
                cookies,
            )
            .await?;
        decode_user_rights(&payload, username)
    }

    #[instrument(skip(self, request, cookies), fields(user = %request.user))]
    async fn set_user_rights(
        &self,
        request: &RightsChangeRequest,
        cookies: &WikiCookies,
    ) -> Result<RightsChange, WikiError> {
        let token = self.csrf_token(cookies).await?;
        // Empty values are dropped from the request, which omits add/remove.
        let response = self
            .post(
                &[
                    ("action", "userrights".to_string()),
                    ("user", request.user.clone()),
                    ("token", token),
                    ("reason", request.reason.clone()),
                    ("add", request.add.join("|")),
                    ("remove", request.remove.join("|")),
                ],
                cookies,
            )
            .await?;
        decode_rights_change(&response.payload)
    }

    async fn list_pages(
        &self,
        from: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<PageSummary>, WikiError> {
        let payload = self
            .query(
                &[
                    ("list", "allpages".to_string()),
                    ("apfrom", from.to_string()),
                    ("aplimit", limit.to_string()),
                ],
                cookies,
            )
            .await?;
        decode_list(&payload, "allpages")
    }

    async fn search_pages(
        &self,
        query: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<SearchHit>, WikiError> {
        let payload = self
            .query(
                &[
                    ("list", "search".to_string()),
                    ("srsearch", query.to_string()),
                    ("srlimit", limit.to_string()),
                ],
                cookies,
            )
            .await?;
        decode_list(&payload, "search")
    }

    async fn list_users(
        &self,
        from: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<WikiUser>, WikiError> {
        let payload = self
            .query(
                &[
                    ("list", "allusers".to_string()),
                    ("aufrom", from.to_string()),
                    ("aulimit", limit.to_string()),
                    ("auprop", "groups|rights|editcount".to_string()),
                ],
                cookies,
            )
            .await?;
        decode_list(&payload, "allusers")
    }

    async fn revision_history(
        &self,
        title: &str,
        limit: u32,
        cookies: &WikiCookies,
    ) -> Result<Vec<Revision>, WikiError> {
        let payload = self
            .query(
                &[
                    ("titles", title.to_string()),
                    ("prop", "revisions".to_string()),
                    ("rvprop", "ids|timestamp|user|comment|size".to_string()),
                    ("rvlimit", limit.to_string()),
                    ("rvdir", "newer".to_string()),
                ],
                cookies,
            )
            .await?;
        decode_revisions(&payload)
    }

    async fn ping(&self) -> Result<(), WikiError> {
        let payload = self
            .query(&[("meta", "siteinfo".to_string())], &WikiCookies::new())
            .await?;
        if payload.pointer("/query/general").is_some() {
            Ok(())
        } else {
            Err(WikiError::Decode("missing query.general".to_string()))
        }
    }
}

/// Prefix the response format and drop empty parameters.
fn request_pairs(params: &Params<'_>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len() + 2);
    pairs.push(("format".to_string(), "json".to_string()));
    pairs.push(("formatversion".to_string(), "2".to_string()));
    for (key, value) in params {
        if !value.is_empty() {
            pairs.push(((*key).to_string(), value.clone()));
        }
    }
    pairs
}

fn check_api_error(payload: &Value) -> Result<(), WikiError> {
    let Some(error) = payload.get("error") else {
        return Ok(());
    };
    let code = error
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    let info = error
        .get("info")
        .and_then(Value::as_str)
        .unwrap_or("unknown info");
    Err(WikiError::Api {
        code: code.to_string(),
        info: info.to_string(),
    })
}

fn from_value<T: DeserializeOwned>(payload: &Value, context: &str) -> Result<T, WikiError> {
    T::deserialize(payload).map_err(|err| WikiError::decode(context, err))
}

#[derive(Clone, Copy, Debug)]
enum TokenKind {
    Login,
    Csrf,
}

impl TokenKind {
    const fn field(self) -> &'static str {
        match self {
            Self::Login => "logintoken",
            Self::Csrf => "csrftoken",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Csrf => "csrf",
        }
    }
}

fn decode_token(payload: &Value, kind: TokenKind) -> Result<String, WikiError> {
    payload
        .get("query")
        .and_then(|query| query.get("tokens"))
        .and_then(|tokens| tokens.get(kind.field()))
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or(WikiError::MissingToken(kind.label()))
}

#[derive(Deserialize)]
struct LoginEnvelope {
    login: LoginResult,
}

#[derive(Deserialize)]
struct LoginResult {
    result: String,
    #[serde(default)]
    lgusername: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Canonical username on success.
fn decode_login(payload: &Value) -> Result<Option<String>, WikiError> {
    let envelope: LoginEnvelope = from_value(payload, "login response")?;
    if envelope.login.result == "Success" {
        Ok(envelope.login.lgusername)
    } else {
        Err(WikiError::LoginRejected {
            result: envelope.login.result,
            reason: envelope.login.reason,
        })
    }
}

#[derive(Deserialize)]
struct QueryEnvelope<T> {
    query: T,
}

#[derive(Deserialize)]
struct PagesQuery {
    #[serde(default)]
    pages: Vec<RawPage>,
}

#[derive(Deserialize)]
struct RawPage {
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    revisions: Vec<RawRevision>,
}

impl RawPage {
    fn exists(&self) -> bool {
        !self.missing && !self.invalid
    }
}

#[derive(Deserialize)]
struct RawRevision {
    #[serde(default)]
    revid: Option<u64>,
    #[serde(default)]
    parentid: Option<u64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    slots: Option<RawSlots>,
}

#[derive(Deserialize)]
struct RawSlots {
    #[serde(default)]
    main: Option<RawSlot>,
}

#[derive(Deserialize)]
struct RawSlot {
    #[serde(default)]
    content: Option<String>,
}

fn first_page(payload: &Value) -> Result<Option<RawPage>, WikiError> {
    let envelope: QueryEnvelope<PagesQuery> = from_value(payload, "page query")?;
    Ok(envelope.query.pages.into_iter().next())
}

fn decode_page_content(payload: &Value) -> Result<Option<PageContent>, WikiError> {
    let Some(page) = first_page(payload)? else {
        return Ok(None);
    };
    if !page.exists() {
        return Ok(None);
    }

    let revision = page.revisions.into_iter().next();
    let Some(revision) = revision else {
        return Ok(Some(PageContent {
            title: page.title,
            content: String::new(),
            timestamp: None,
            user: None,
            comment: None,
            revid: None,
        }));
    };

    let content = revision
        .slots
        .and_then(|slots| slots.main)
        .and_then(|slot| slot.content)
        .unwrap_or_default();

    Ok(Some(PageContent {
        title: page.title,
        content,
        timestamp: revision.timestamp,
        user: revision.user,
        comment: revision.comment,
        revid: revision.revid,
    }))
}

fn decode_revisions(payload: &Value) -> Result<Vec<Revision>, WikiError> {
    let Some(page) = first_page(payload)? else {
        return Ok(Vec::new());
    };
    Ok(page
        .revisions
        .into_iter()
        .filter_map(|revision| {
            Some(Revision {
                revid: revision.revid?,
                parentid: revision.parentid,
                timestamp: revision.timestamp,
                user: revision.user,
                comment: revision.comment,
                size: revision.size,
            })
        })
        .collect())
}

#[derive(Deserialize)]
struct EditEnvelope {
    edit: RawEdit,
}

#[derive(Deserialize)]
struct RawEdit {
    result: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    newrevid: Option<u64>,
    #[serde(default)]
    nochange: bool,
}

fn decode_edit(payload: &Value) -> Result<EditOutcome, WikiError> {
    let envelope: EditEnvelope = from_value(payload, "edit response")?;
    if envelope.edit.result != "Success" {
        return Err(WikiError::EditRejected {
            result: envelope.edit.result,
        });
    }
    Ok(EditOutcome {
        title: envelope.edit.title,
        newrevid: envelope.edit.newrevid,
        nochange: envelope.edit.nochange,
    })
}

#[derive(Deserialize)]
struct ParseEnvelope {
    parse: RawParse,
}

#[derive(Deserialize)]
struct RawParse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    links: Vec<PageLink>,
}

fn decode_parse(payload: &Value) -> Result<ParsedPage, WikiError> {
    let envelope: ParseEnvelope = from_value(payload, "parse response")?;
    Ok(ParsedPage {
        html: envelope.parse.text,
        links: envelope.parse.links,
    })
}

#[derive(Deserialize)]
struct UserInfoQuery {
    userinfo: UserInfo,
}

fn decode_user_info(payload: &Value) -> Result<UserInfo, WikiError> {
    let envelope: QueryEnvelope<UserInfoQuery> = from_value(payload, "userinfo response")?;
    Ok(envelope.query.userinfo)
}

#[derive(Deserialize)]
struct UsersQuery {
    #[serde(default)]
    users: Vec<RawUser>,
}

#[derive(Deserialize)]
struct RawUser {
    #[serde(default)]
    name: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    rights: Vec<String>,
}

fn decode_user_rights(payload: &Value, username: &str) -> Result<Option<UserRights>, WikiError> {
    let envelope: QueryEnvelope<UsersQuery> = from_value(payload, "users response")?;
    let Some(user) = envelope.query.users.into_iter().next() else {
        return Ok(None);
    };
    if user.missing || user.invalid || user.name != username {
        return Ok(None);
    }
    Ok(Some(UserRights {
        groups: user.groups,
        rights: user.rights,
    }))
}

#[derive(Deserialize)]
struct RightsEnvelope {
    userrights: RawRightsChange,
}

#[derive(Deserialize)]
struct RawRightsChange {
    #[serde(default)]
    user: String,
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
}

fn decode_rights_change(payload: &Value) -> Result<RightsChange, WikiError> {
    let envelope: RightsEnvelope = from_value(payload, "userrights response")?;
    Ok(RightsChange {
        user: envelope.userrights.user,
        added: envelope.userrights.added,
        removed: envelope.userrights.removed,
    })
}

/// Decode `query.<key>` as a list, treating an absent key as empty.
fn decode_list<T: DeserializeOwned>(payload: &Value, key: &str) -> Result<Vec<T>, WikiError> {
    match payload.get("query").and_then(|query| query.get(key)) {
        Some(list) => from_value(list, key),
        None => Ok(Vec::new()),
    }
}
