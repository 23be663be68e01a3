use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info_span, Instrument};
use utoipa::ToSchema;

use crate::{api::AppState, GIT_COMMIT_HASH};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    status: String,
    /// RFC 3339, UTC with milliseconds.
    timestamp: String,
    name: String,
    version: String,
    commit: String,
    mediawiki: String,
    sessions: String,
}

const fn status_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "MediaWiki and the session store are reachable", body = Health),
        (status = 503, description = "MediaWiki or the session store is unreachable", body = Health)
    ),
    tag = "health"
)]
pub async fn health(state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let wiki = state
        .wiki()
        .ping()
        .instrument(info_span!("mediawiki.ping"))
        .await;
    if let Err(err) = &wiki {
        error!("Failed to reach MediaWiki: {err}");
    }

    let sessions = state
        .sessions()
        .ping()
        .instrument(info_span!("sessions.ping"))
        .await;
    if let Err(err) = &sessions {
        error!("Failed to reach session store: {err}");
    }

    let is_healthy = wiki.is_ok() && sessions.is_ok();

    let health = Health {
        status: if is_healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: GIT_COMMIT_HASH.to_string(),
        mediawiki: status_label(wiki.is_ok()).to_string(),
        sessions: status_label(sessions.is_ok()).to_string(),
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>() {
        Ok(value) => {
            debug!("X-App header: {:?}", value);
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to parse X-App header: {}", err),
    }

    let status = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, headers, Json(health))
}
