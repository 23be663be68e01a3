//! Session login against MediaWiki.
//!
//! Login authenticates with `action=login`, then stores the MediaWiki cookies
//! and the resolved user in a fresh gateway session. Every later request
//! replays those cookies, so MediaWiki enforces its own permissions on top of
//! the gateway's `authenticated`/`admin` checks.

pub mod login;
pub mod logout;
pub mod me;
pub mod register;
pub mod types;
