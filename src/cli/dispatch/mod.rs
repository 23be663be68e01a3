//! Maps parsed arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{http, mediawiki, session, ARG_PORT};
use anyhow::Result;
use std::time::Duration;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or blank.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(5000);

    let wiki_opts = mediawiki::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches);
    let http_opts = http::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        mediawiki_url: wiki_opts.url,
        mediawiki_api_path: wiki_opts.api_path,
        mediawiki_timeout: Duration::from_secs(wiki_opts.timeout_seconds),
        frontend_url: http_opts.frontend_url,
        session_ttl: Duration::from_secs(session_opts.ttl_seconds),
        session_secure: session_opts.secure,
        session_dsn: session_opts.dsn,
        rate_limit_requests: http_opts.rate_limit_requests,
        rate_limit_window: Duration::from_secs(http_opts.rate_limit_window_seconds),
        static_dir: http_opts.static_dir,
    }))
}
