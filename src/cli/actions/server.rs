use crate::{
    api::{self, rate_limit::RateLimiter, AppState},
    cli::telemetry,
    mediawiki::{MediaWikiClient, MediaWikiConfig},
    session::{MemoryStore, PgSessionStore, SessionConfig, SessionStore},
};
use anyhow::{Context, Result};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub mediawiki_url: String,
    pub mediawiki_api_path: String,
    pub mediawiki_timeout: Duration,
    pub frontend_url: String,
    pub session_ttl: Duration,
    pub session_secure: bool,
    pub session_dsn: Option<String>,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
    pub static_dir: Option<PathBuf>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the MediaWiki client or the session store cannot be
/// set up, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let wiki_config = MediaWikiConfig::new(args.mediawiki_url)
        .with_api_path(args.mediawiki_api_path)
        .with_timeout(args.mediawiki_timeout);
    let wiki = MediaWikiClient::new(&wiki_config).context("Failed to build MediaWiki client")?;
    info!(api_url = %wiki.api_url(), "MediaWiki API");

    let sessions: Arc<dyn SessionStore> = match args.session_dsn.as_deref() {
        Some(dsn) => Arc::new(
            PgSessionStore::connect(dsn)
                .await
                .context("Failed to connect to the session database")?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let state = AppState::new(Arc::new(wiki), sessions)
        .with_session_config(SessionConfig::new(args.session_ttl, args.session_secure))
        .with_frontend_url(args.frontend_url);
    let limiter = RateLimiter::new(args.rate_limit_requests, args.rate_limit_window);

    let result = api::new(
        args.port,
        Arc::new(state),
        Arc::new(limiter),
        args.static_dir.as_deref(),
    )
    .await;

    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("mediawiki_url", args.mediawiki_url.clone()),
        ("mediawiki_api_path", args.mediawiki_api_path.clone()),
        (
            "mediawiki_timeout",
            format!("{}s", args.mediawiki_timeout.as_secs()),
        ),
        ("frontend_url", args.frontend_url.clone()),
        ("session_ttl", format!("{}s", args.session_ttl.as_secs())),
        ("session_secure", args.session_secure.to_string()),
        (
            "session_store",
            args.session_dsn
                .as_deref()
                .map_or_else(|| "memory".to_string(), redact_dsn),
        ),
        (
            "rate_limit",
            format!(
                "{} requests / {}s",
                args.rate_limit_requests,
                args.rate_limit_window.as_secs()
            ),
        ),
        (
            "static_dir",
            args.static_dir
                .as_ref()
                .map_or_else(|| "none".to_string(), |dir| dir.display().to_string()),
        ),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!("{}\n\n{title}:", banner());
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn banner() -> String {
    format!(
        "A G A P E D I A - {} - {}",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    )
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
