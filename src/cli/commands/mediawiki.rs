use clap::{Arg, ArgMatches, Command};

use crate::mediawiki::{DEFAULT_API_PATH, DEFAULT_BASE_URL};

pub const ARG_MEDIAWIKI_URL: &str = "mediawiki-url";
pub const ARG_MEDIAWIKI_API_PATH: &str = "mediawiki-api-path";
pub const ARG_MEDIAWIKI_TIMEOUT: &str = "mediawiki-timeout";

#[derive(Debug, Clone)]
pub struct Options {
    pub url: String,
    pub api_path: String,
    pub timeout_seconds: u64,
}

impl Options {
    /// Parse MediaWiki arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the URL is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = matches
            .get_one::<String>(ARG_MEDIAWIKI_URL)
            .cloned()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_MEDIAWIKI_URL}"))?;

        Ok(Self {
            url,
            api_path: matches
                .get_one::<String>(ARG_MEDIAWIKI_API_PATH)
                .cloned()
                .unwrap_or_else(|| DEFAULT_API_PATH.to_string()),
            timeout_seconds: matches
                .get_one::<u64>(ARG_MEDIAWIKI_TIMEOUT)
                .copied()
                .unwrap_or(30),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_MEDIAWIKI_URL)
                .long(ARG_MEDIAWIKI_URL)
                .help("Base URL of the MediaWiki installation")
                .env("AGAPEDIA_MEDIAWIKI_URL")
                .default_value(DEFAULT_BASE_URL),
        )
        .arg(
            Arg::new(ARG_MEDIAWIKI_API_PATH)
                .long(ARG_MEDIAWIKI_API_PATH)
                .help("Path of api.php below the base URL")
                .env("AGAPEDIA_MEDIAWIKI_API_PATH")
                .default_value(DEFAULT_API_PATH),
        )
        .arg(
            Arg::new(ARG_MEDIAWIKI_TIMEOUT)
                .long(ARG_MEDIAWIKI_TIMEOUT)
                .help("Timeout for MediaWiki API requests in seconds")
                .env("AGAPEDIA_MEDIAWIKI_TIMEOUT")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
