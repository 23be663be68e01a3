use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

use crate::api::{
    rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW},
    state::DEFAULT_FRONTEND_URL,
};

pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_RATE_LIMIT_REQUESTS: &str = "rate-limit-requests";
pub const ARG_RATE_LIMIT_WINDOW: &str = "rate-limit-window";
pub const ARG_STATIC_DIR: &str = "static-dir";

#[derive(Debug, Clone)]
pub struct Options {
    pub frontend_url: String,
    pub rate_limit_requests: u32,
    pub rate_limit_window_seconds: u64,
    pub static_dir: Option<PathBuf>,
}

impl Options {
    /// Parse HTTP surface arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the frontend URL is blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let frontend_url = matches
            .get_one::<String>(ARG_FRONTEND_URL)
            .cloned()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_FRONTEND_URL}"))?;

        Ok(Self {
            frontend_url,
            rate_limit_requests: matches
                .get_one::<u32>(ARG_RATE_LIMIT_REQUESTS)
                .copied()
                .unwrap_or(DEFAULT_MAX_REQUESTS),
            rate_limit_window_seconds: matches
                .get_one::<u64>(ARG_RATE_LIMIT_WINDOW)
                .copied()
                .unwrap_or(DEFAULT_WINDOW.as_secs()),
            static_dir: matches.get_one::<PathBuf>(ARG_STATIC_DIR).cloned(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Frontend origin allowed by CORS")
                .env("AGAPEDIA_FRONTEND_URL")
                .default_value(DEFAULT_FRONTEND_URL),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_REQUESTS)
                .long(ARG_RATE_LIMIT_REQUESTS)
                .help("Requests allowed per client IP in each window")
                .env("AGAPEDIA_RATE_LIMIT_REQUESTS")
                .default_value("100")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW)
                .long(ARG_RATE_LIMIT_WINDOW)
                .help("Rate limit window in seconds")
                .env("AGAPEDIA_RATE_LIMIT_WINDOW")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_STATIC_DIR)
                .long(ARG_STATIC_DIR)
                .help("Directory with the built frontend, served for non-API paths")
                .env("AGAPEDIA_STATIC_DIR")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}
