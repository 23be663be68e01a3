//! HTTP surface: the `/api` routes, their layers and the static frontend.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    middleware,
    routing::{get, post, put},
    Extension, Router,
};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    services::{ServeDir, ServeFile},
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

use crate::session::spawn_pruner;

mod error;
pub mod handlers;
mod openapi;
pub(crate) mod payload;
pub mod rate_limit;
pub mod state;

pub use error::ApiError;
pub use openapi::openapi;
pub use state::AppState;

use handlers::{articles, auth, health, not_found, root, users};
use rate_limit::RateLimiter;

/// Request bodies above this size are refused.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const REQUEST_ID: &str = "x-request-id";

/// Build the application router.
///
/// `/api` carries the JSON routes behind the rate limiter. When `static_dir` is
/// set, every other path is served from it, falling back to its `index.html`.
///
/// # Errors
/// Returns an error if the configured frontend URL is not a valid origin.
pub fn router(
    state: Arc<AppState>,
    limiter: Arc<RateLimiter>,
    static_dir: Option<&Path>,
) -> Result<Router> {
    let api = Router::new()
        .route("/", get(root::root))
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login::login))
        .route("/auth/register", post(auth::register::register))
        .route("/auth/logout", post(auth::logout::logout))
        .route("/auth/me", get(auth::me::me))
        .route(
            "/articles",
            get(articles::list_articles).post(articles::create_article),
        )
        .route("/articles/search", get(articles::search_articles))
        .route(
            "/articles/:title",
            get(articles::get_article)
                .put(articles::update_article)
                .delete(articles::delete_article),
        )
        .route("/articles/:title/parse", get(articles::parse_article))
        .route(
            "/articles/:title/revisions",
            get(articles::article_revisions),
        )
        .route("/users", get(users::list_users))
        .route("/users/:username", get(users::get_user))
        .route("/users/:username/block", put(users::block_user))
        .route("/users/:username/role", put(users::change_role))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce));

    let app = Router::new()
        .nest("/api", api)
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", openapi()));

    let app = match static_dir {
        Some(dir) => app.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => app.fallback(not_found),
    };

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(AllowOrigin::list([frontend_origin(state.frontend_url())?]))
        .allow_credentials(true);

    Ok(app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static(REQUEST_ID),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                REQUEST_ID,
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors)
            .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
            .layer(Extension(state)),
    ))
}

/// Start the server and run until SIGINT/SIGTERM.
///
/// # Errors
/// Returns an error if the router cannot be built or the port cannot be bound.
pub async fn new(
    port: u16,
    state: Arc<AppState>,
    limiter: Arc<RateLimiter>,
    static_dir: Option<&Path>,
) -> Result<()> {
    let pruner = spawn_pruner(state.session_store());
    let app = router(state, limiter, static_dir)?;

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pruner.abort();
    info!("Gracefully shutdown");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_url)
        .with_context(|| format!("Invalid frontend URL: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend URL must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{
        handlers::test_support::{default_wiki, json_body, TestApp},
        rate_limit::RateLimiter,
    };
    use crate::session::MemoryStore;
    use axum::http::{
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_REQUEST_METHOD, ORIGIN, RETRY_AFTER,
        },
        StatusCode,
    };
    use std::{fs, time::Duration};
    use tower::ServiceExt;

    #[test]
    fn frontend_origin_strips_path() -> Result<()> {
        assert_eq!(
            frontend_origin("https://wiki.example.org/app/")?,
            HeaderValue::from_static("https://wiki.example.org")
        );
        assert_eq!(
            frontend_origin("http://localhost:3000")?,
            HeaderValue::from_static("http://localhost:3000")
        );
        assert!(frontend_origin("not a url").is_err());
        Ok(())
    }

    #[test]
    fn invalid_frontend_url_fails_router() {
        let state = AppState::new(Arc::new(default_wiki()), Arc::new(MemoryStore::new()))
            .with_frontend_url("mailto:nobody".to_string());
        assert!(router(Arc::new(state), Arc::new(RateLimiter::default()), None).is_err());
    }

    #[tokio::test]
    async fn unknown_api_path_is_json_404() -> Result<()> {
        let app = TestApp::new();
        let response = app.get("/api/nope", None).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await?["error"], "Not found");
        Ok(())
    }

    #[tokio::test]
    async fn request_id_is_propagated() -> Result<()> {
        let app = TestApp::new();
        let response = app.get("/api", None).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let request_id = response
            .headers()
            .get(REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
            .unwrap_or_default();
        assert!(Ulid::from_string(&request_id).is_ok());

        let request = Request::builder()
            .uri("/api")
            .header(REQUEST_ID, "abc-123")
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert_eq!(
            response.headers().get(REQUEST_ID),
            Some(&HeaderValue::from_static("abc-123"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn cors_allows_frontend_with_credentials() -> Result<()> {
        let app = TestApp::new();
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/articles")
            .header(ORIGIN, "http://localhost:3000")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "PUT")
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:3000"))
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_CREDENTIALS),
            Some(&HeaderValue::from_static("true"))
        );

        let request = Request::builder()
            .uri("/api")
            .header(ORIGIN, "https://evil.example")
            .body(Body::empty())?;
        let response = app.oneshot(request).await?;
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn api_routes_are_rate_limited() -> Result<()> {
        let app = TestApp::with_limiter(RateLimiter::new(2, Duration::from_secs(60)));
        for _ in 0..2 {
            assert_eq!(app.get("/api", None).await?.status(), StatusCode::OK);
        }
        let response = app.get("/api", None).await?;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER),
            Some(&HeaderValue::from_static("60"))
        );
        assert_eq!(
            json_body(response).await?["error"],
            "Too many requests, please try again later."
        );

        // Other callers have their own window.
        let request = Request::builder()
            .uri("/api")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())?;
        assert_eq!(app.oneshot(request).await?.status(), StatusCode::OK);

        // The docs live outside the limiter.
        let response = app.get("/api/openapi.json", None).await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() -> Result<()> {
        let app = TestApp::new();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(vec![b' '; MAX_BODY_SIZE + 1]))?;
        let response = app.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn serves_static_frontend_with_index_fallback() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("agapedia-static-{}", Ulid::new()));
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("index.html"), "<html>agapedia</html>")?;
        fs::write(dir.join("app.js"), "console.log('hi');")?;

        let state = AppState::new(Arc::new(default_wiki()), Arc::new(MemoryStore::new()));
        let app = router(
            Arc::new(state),
            Arc::new(RateLimiter::default()),
            Some(dir.as_path()),
        )?;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/app.js").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/wiki/Main_Page").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"<html>agapedia</html>");

        // API paths never fall through to the frontend.
        let response = app
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
