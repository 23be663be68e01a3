use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_SESSION_SECURE: &str = "session-secure";
pub const ARG_SESSION_DSN: &str = "session-dsn";

#[derive(Debug, Clone)]
pub struct Options {
    pub ttl_seconds: u64,
    pub secure: bool,
    /// Postgres DSN; sessions stay in memory when unset.
    pub dsn: Option<String>,
}

impl Options {
    /// Parse session arguments from matches.
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL)
                .copied()
                .unwrap_or(86_400),
            secure: matches.get_flag(ARG_SESSION_SECURE),
            dsn: matches
                .get_one::<String>(ARG_SESSION_DSN)
                .cloned()
                .filter(|dsn| !dsn.trim().is_empty()),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long(ARG_SESSION_TTL)
                .help("Session lifetime in seconds")
                .env("AGAPEDIA_SESSION_TTL")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_SECURE)
                .long(ARG_SESSION_SECURE)
                .help("Mark the session cookie Secure (serve over HTTPS)")
                .env("AGAPEDIA_SESSION_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_SESSION_DSN)
                .long(ARG_SESSION_DSN)
                .help("Postgres connection string for the session store (default: in memory)")
                .env("AGAPEDIA_SESSION_DSN"),
        )
}
