//! Article routes: reads are public, writes need a session, deletes need `sysop`.

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{parse_limit, ListQuery};
use crate::{
    api::{
        payload::{non_empty, Payload},
        state::{require_admin, require_auth},
        ApiError, AppState,
    },
    mediawiki::{PageEdit, PageLink},
};

const DEFAULT_LIST_LIMIT: u32 = 500;
const DEFAULT_SEARCH_LIMIT: u32 = 50;
const DEFAULT_REVISION_LIMIT: u32 = 50;
const DEFAULT_DELETE_REASON: &str = "Deleted by admin";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ArticleSummary {
    pub title: String,
    pub id: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ArticleList {
    pub articles: Vec<ArticleSummary>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub title: String,
    pub id: u64,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wordcount: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    pub articles: Vec<SearchResult>,
    pub query: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Full-text search terms.
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub timestamp: Option<String>,
    pub user: Option<String>,
    pub comment: Option<String>,
    pub revid: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ParsedArticle {
    pub title: String,
    pub html: String,
    pub links: Vec<PageLink>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevisionEntry {
    pub revid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parentid: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RevisionHistory {
    pub title: String,
    pub revisions: Vec<RevisionEntry>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateArticle {
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateArticle {
    pub content: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeleteArticle {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EditResponse {
    pub success: bool,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revid: Option<u64>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/api/articles",
    params(ListQuery),
    responses(
        (status = 200, description = "Pages in title order", body = ArticleList)
    ),
    tag = "articles"
)]
pub async fn list_articles(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cookies = state.wiki_cookies(&headers).await?;
    let pages = state
        .wiki()
        .list_pages(query.from(), query.limit(DEFAULT_LIST_LIMIT), &cookies)
        .await?;

    let articles = pages
        .into_iter()
        .map(|page| ArticleSummary {
            title: page.title,
            id: page.pageid,
        })
        .collect();
    Ok(Json(ArticleList { articles }))
}

#[utoipa::path(
    get,
    path = "/api/articles/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Full-text search hits", body = SearchResponse),
        (status = 400, description = "Missing search query")
    ),
    tag = "articles"
)]
pub async fn search_articles(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(q) = non_empty(query.q) else {
        return Err(ApiError::BadRequest("Search query is required"));
    };
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_SEARCH_LIMIT);

    let cookies = state.wiki_cookies(&headers).await?;
    let hits = state.wiki().search_pages(&q, limit, &cookies).await?;

    let articles = hits
        .into_iter()
        .map(|hit| SearchResult {
            title: hit.title,
            id: hit.pageid,
            snippet: hit.snippet,
            size: hit.size,
            wordcount: hit.wordcount,
        })
        .collect();
    Ok(Json(SearchResponse { articles, query: q }))
}

#[utoipa::path(
    get,
    path = "/api/articles/{title}",
    params(("title" = String, Path, description = "Page title")),
    responses(
        (status = 200, description = "Latest revision wikitext", body = Article),
        (status = 404, description = "Article not found")
    ),
    tag = "articles"
)]
pub async fn get_article(
    Path(title): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let cookies = state.wiki_cookies(&headers).await?;
    let page = state
        .wiki()
        .page_content(&title, &cookies)
        .await?
        .ok_or(ApiError::NotFound("Article not found"))?;

    Ok(Json(Article {
        title: page.title,
        content: page.content,
        timestamp: page.timestamp,
        user: page.user,
        comment: page.comment,
        revid: page.revid,
    }))
}

#[utoipa::path(
    get,
    path = "/api/articles/{title}/parse",
    params(("title" = String, Path, description = "Page title")),
    responses(
        (status = 200, description = "Rendered HTML and outgoing links", body = ParsedArticle),
        (status = 404, description = "Article not found")
    ),
    tag = "articles"
)]
pub async fn parse_article(
    Path(title): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let cookies = state.wiki_cookies(&headers).await?;
    let page = state
        .wiki()
        .page_content(&title, &cookies)
        .await?
        .ok_or(ApiError::NotFound("Article not found"))?;

    let parsed = state
        .wiki()
        .parse_wikitext(&page.content, &page.title, &cookies)
        .await?;

    Ok(Json(ParsedArticle {
        title: page.title,
        html: parsed.html,
        links: parsed.links,
    }))
}

#[utoipa::path(
    get,
    path = "/api/articles/{title}/revisions",
    params(("title" = String, Path, description = "Page title"), LimitQuery),
    responses(
        (status = 200, description = "Oldest-first revision history", body = RevisionHistory)
    ),
    tag = "articles"
)]
pub async fn article_revisions(
    Path(title): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = parse_limit(query.limit.as_deref(), DEFAULT_REVISION_LIMIT);
    let cookies = state.wiki_cookies(&headers).await?;
    let revisions = state
        .wiki()
        .revision_history(&title, limit, &cookies)
        .await?
        .into_iter()
        .map(|revision| RevisionEntry {
            revid: revision.revid,
            parentid: revision.parentid,
            timestamp: revision.timestamp,
            user: revision.user,
            comment: revision.comment,
            size: revision.size,
        })
        .collect();

    Ok(Json(RevisionHistory { title, revisions }))
}

#[utoipa::path(
    post,
    path = "/api/articles",
    request_body = CreateArticle,
    responses(
        (status = 201, description = "Article created", body = EditResponse),
        (status = 400, description = "Title or content missing"),
        (status = 401, description = "Authentication required")
    ),
    tag = "articles"
)]
pub async fn create_article(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Payload(request): Payload<CreateArticle>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&state, &headers).await?;
    let (Some(title), Some(text)) = (non_empty(request.title), non_empty(request.content)) else {
        return Err(ApiError::BadRequest("Title and content are required"));
    };

    let edit = PageEdit {
        title,
        text,
        summary: request.summary.unwrap_or_default(),
    };
    let outcome = state.wiki().edit_page(&edit, &principal.cookies).await?;
    info!(title = %outcome.title, user = %principal.user.username, "article created");

    Ok((
        StatusCode::CREATED,
        Json(EditResponse {
            success: true,
            title: outcome.title,
            revid: outcome.newrevid,
            message: "Article created successfully".to_string(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/articles/{title}",
    params(("title" = String, Path, description = "Page title")),
    request_body = UpdateArticle,
    responses(
        (status = 200, description = "Article updated", body = EditResponse),
        (status = 400, description = "Content missing"),
        (status = 401, description = "Authentication required")
    ),
    tag = "articles"
)]
pub async fn update_article(
    Path(title): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Payload(request): Payload<UpdateArticle>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_auth(&state, &headers).await?;
    let Some(text) = non_empty(request.content) else {
        return Err(ApiError::BadRequest("Content is required"));
    };

    let edit = PageEdit {
        title,
        text,
        summary: request.summary.unwrap_or_default(),
    };
    let outcome = state.wiki().edit_page(&edit, &principal.cookies).await?;
    info!(title = %outcome.title, user = %principal.user.username, "article updated");

    Ok(Json(EditResponse {
        success: true,
        title: outcome.title,
        revid: outcome.newrevid,
        message: "Article updated successfully".to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/api/articles/{title}",
    params(("title" = String, Path, description = "Page title")),
    request_body(content = DeleteArticle, description = "Optional deletion reason"),
    responses(
        (status = 200, description = "Article deleted", body = DeleteResponse),
        (status = 401, description = "Authentication required"),
        (status = 403, description = "Admin access required")
    ),
    tag = "articles"
)]
pub async fn delete_article(
    Path(title): Path<String>,
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Payload(request): Payload<DeleteArticle>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = require_admin(&state, &headers).await?;
    let reason = non_empty(request.reason).unwrap_or_else(|| DEFAULT_DELETE_REASON.to_string());

    state
        .wiki()
        .delete_page(&title, &reason, &principal.cookies)
        .await?;
    info!(%title, user = %principal.user.username, "article deleted");

    Ok(Json(DeleteResponse {
        success: true,
        message: "Article deleted successfully".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::handlers::test_support::{json_body, TestApp};
    use crate::mediawiki::fake::FakeWiki;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn list_and_paginate() -> anyhow::Result<()> {
        let app = TestApp::new();
        let body = json_body(app.get("/api/articles", None).await?).await?;
        let titles: Vec<&str> = body["articles"]
            .as_array()
            .map(|list| list.iter().filter_map(|item| item["title"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(titles, vec!["Agapedia", "Main Page"]);
        assert!(body["articles"][0]["id"].as_u64().is_some());

        let body = json_body(app.get("/api/articles?from=B&limit=1", None).await?).await?;
        assert_eq!(body["articles"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["articles"][0]["title"], "Main Page");
        Ok(())
    }

    #[tokio::test]
    async fn search_requires_query() -> anyhow::Result<()> {
        let app = TestApp::new();
        let response = app.get("/api/articles/search", None).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await?["error"], "Search query is required");

        let body = json_body(app.get("/api/articles/search?q=encyclopedia", None).await?).await?;
        assert_eq!(body["query"], "encyclopedia");
        assert_eq!(body["articles"][0]["title"], "Agapedia");
        assert!(body["articles"][0]["wordcount"].as_u64().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn get_article_and_missing() -> anyhow::Result<()> {
        let app = TestApp::new();
        let response = app.get("/api/articles/Main%20Page", None).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["title"], "Main Page");
        assert!(body["content"]
            .as_str()
            .is_some_and(|content| content.starts_with("Welcome")));
        assert!(body["revid"].as_u64().is_some());

        let response = app.get("/api/articles/Nowhere", None).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await?["error"], "Article not found");
        Ok(())
    }

    #[tokio::test]
    async fn article_without_revision_metadata_has_null_fields() -> anyhow::Result<()> {
        let app = TestApp::new();
        let response = app.get("/api/articles/Blank", None).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["title"], "Blank");
        assert_eq!(body["content"], "");
        for key in ["timestamp", "user", "comment", "revid"] {
            assert!(
                body.get(key).is_some_and(serde_json::Value::is_null),
                "{key} should be null"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn parse_renders_current_content() -> anyhow::Result<()> {
        let app = TestApp::new();
        let body = json_body(app.get("/api/articles/Main%20Page/parse", None).await?).await?;
        assert_eq!(body["title"], "Main Page");
        assert!(body["html"]
            .as_str()
            .is_some_and(|html| html.contains("mw-parser-output")));
        assert_eq!(body["links"][0]["title"], "Agapedia");
        assert_eq!(body["links"][0]["exists"], true);
        assert_eq!(body["links"][1]["exists"], false);

        let response = app.get("/api/articles/Nowhere/parse", None).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn revisions_of_missing_page_are_empty() -> anyhow::Result<()> {
        let app = TestApp::new();
        let body = json_body(app.get("/api/articles/Nowhere/revisions", None).await?).await?;
        assert_eq!(body["title"], "Nowhere");
        assert_eq!(body["revisions"], json!([]));
        Ok(())
    }

    #[tokio::test]
    async fn create_requires_session_and_fields() -> anyhow::Result<()> {
        let app = TestApp::new();
        let article = json!({ "title": "New page", "content": "Fresh text", "summary": "start" });

        let response = app
            .send(Method::POST, "/api/articles", None, Some(article.clone()))
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await?["error"], "Authentication required");

        let token = app.login("Alice", "alicepass").await?;
        let response = app
            .send(
                Method::POST,
                "/api/articles",
                Some(&token),
                Some(json!({ "title": "New page" })),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await?["error"],
            "Title and content are required"
        );

        let response = app
            .send(Method::POST, "/api/articles", Some(&token), Some(article))
            .await?;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await?;
        assert_eq!(body["success"], true);
        assert_eq!(body["title"], "New page");
        assert!(body["revid"].as_u64().is_some());
        assert_eq!(body["message"], "Article created successfully");

        // Writes carry the user's MediaWiki cookies, not an anonymous jar.
        assert!(app
            .wiki
            .seen_cookies()
            .contains(&FakeWiki::session_cookies("Alice")));

        let history = json_body(app.get("/api/articles/New%20page/revisions", None).await?).await?;
        assert_eq!(history["revisions"][0]["user"], "Alice");
        assert_eq!(history["revisions"][0]["comment"], "start");
        Ok(())
    }

    #[tokio::test]
    async fn update_requires_content() -> anyhow::Result<()> {
        let app = TestApp::new();
        let token = app.login("Alice", "alicepass").await?;

        let response = app
            .send(
                Method::PUT,
                "/api/articles/Agapedia",
                Some(&token),
                Some(json!({ "summary": "nothing" })),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await?["error"], "Content is required");

        let response = app
            .send(
                Method::PUT,
                "/api/articles/Agapedia",
                Some(&token),
                Some(json!({ "content": "Agapedia, revised." })),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await?;
        assert_eq!(body["message"], "Article updated successfully");

        let history = json_body(app.get("/api/articles/Agapedia/revisions", None).await?).await?;
        assert_eq!(history["revisions"].as_array().map(Vec::len), Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn delete_is_admin_only() -> anyhow::Result<()> {
        let app = TestApp::new();
        let alice = app.login("Alice", "alicepass").await?;
        let response = app
            .send(Method::DELETE, "/api/articles/Agapedia", Some(&alice), None)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await?["error"], "Admin access required");
        assert!(app.wiki.has_page("Agapedia"));

        let admin = app.login("Admin", "adminpass").await?;
        let response = app
            .send(Method::DELETE, "/api/articles/Agapedia", Some(&admin), None)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await?["message"],
            "Article deleted successfully"
        );
        assert!(!app.wiki.has_page("Agapedia"));

        let response = app
            .send(Method::DELETE, "/api/articles/Agapedia", Some(&admin), None)
            .await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        Ok(())
    }

    #[tokio::test]
    async fn upstream_errors_surface_as_500() -> anyhow::Result<()> {
        let app = TestApp::new();
        app.wiki.set_failing(true);
        let response = app.get("/api/articles", None).await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await?["error"],
            "MediaWiki API error: A database query error has occurred. (code: internal_api_error_DBQueryError)"
        );
        Ok(())
    }
}
