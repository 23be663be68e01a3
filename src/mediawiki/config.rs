use std::time::Duration;
use url::Url;

use super::WikiError;

pub const DEFAULT_BASE_URL: &str = "http://localhost/mediawiki";
pub const DEFAULT_API_PATH: &str = "/api.php";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Where the MediaWiki installation lives and how to talk to it.
#[derive(Clone, Debug)]
pub struct MediaWikiConfig {
    base_url: String,
    api_path: String,
    user_agent: String,
    timeout: Duration,
}

impl Default for MediaWikiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL.to_string())
    }
}

impl MediaWikiConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            api_path: DEFAULT_API_PATH.to_string(),
            user_agent: crate::APP_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_api_path(mut self, api_path: String) -> Self {
        self.api_path = api_path;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full `api.php` endpoint.
    ///
    /// # Errors
    /// Returns [`WikiError::Config`] if the joined URL does not parse.
    pub fn api_url(&self) -> Result<Url, WikiError> {
        let base = self.base_url.trim_end_matches('/');
        let path = self.api_path.trim_start_matches('/');
        let joined = format!("{base}/{path}");
        Url::parse(&joined).map_err(|err| WikiError::Config(format!("{joined}: {err}")))
    }
}
