//! Fixed-window request limiting per client IP.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::ApiError;

pub const DEFAULT_MAX_REQUESTS: u32 = 100;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug)]
struct Clients {
    windows: HashMap<String, Window>,
    last_sweep: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<Clients>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(Clients {
                windows: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Number of clients with a tracked window.
    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .map_or(0, |clients| clients.windows.len())
    }

    /// Count one request from `client` against its current window.
    pub fn check(&self, client: &str) -> RateLimitDecision {
        let now = Instant::now();
        let Ok(mut clients) = self.clients.lock() else {
            warn!("rate limiter state poisoned, allowing request");
            return RateLimitDecision::Allowed;
        };

        // Expired windows are dropped at most once per window length.
        if now.duration_since(clients.last_sweep) >= self.window {
            let window = self.window;
            clients
                .windows
                .retain(|_, entry| now.duration_since(entry.started) < window);
            clients.last_sweep = now;
        }

        let entry = clients.windows.entry(client.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.hits = 0;
        }

        if entry.hits >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            return RateLimitDecision::Limited { retry_after };
        }
        entry.hits += 1;
        RateLimitDecision::Allowed
    }
}

/// Client IP for rate limiting: proxy headers first, then the socket peer.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_ip(request.headers(), peer).unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&client) {
        RateLimitDecision::Allowed => next.run(request).await,
        RateLimitDecision::Limited { retry_after } => {
            debug!(client, "rate limit exceeded");
            ApiError::TooManyRequests { retry_after }.into_response()
        }
    }
}
