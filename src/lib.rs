//! # Agapedia (MediaWiki gateway)
//!
//! `agapedia` sits between a browser frontend and a MediaWiki installation. It
//! exposes a small JSON API for reading and editing articles and for user
//! administration, and forwards every call to MediaWiki's Action API.
//!
//! ## Sessions
//!
//! Logging in goes through MediaWiki's own `action=login`. The cookies MediaWiki
//! hands back are kept server side, in a session identified by an opaque
//! `agapedia.sid` cookie, and are relayed on every later call made for that
//! user. Sessions live in memory or, when a DSN is configured, in Postgres.
//!
//! ## Authorization
//!
//! Reads are public. Writes need a logged-in session, and deletes, blocks,
//! group changes and the user list need membership in MediaWiki's `sysop`
//! group. MediaWiki remains the final authority: it rejects anything the
//! relayed session is not allowed to do.

pub mod api;
pub mod cli;
pub mod mediawiki;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
