//! The HTTP session shared by catalog lookups and downloads.

use std::time::Duration;

use bundlebot_shared::{BundleError, PipelineConfig, Result};
use reqwest::Client;
use tracing::{debug, info};

/// User-Agent string for catalog and download requests.
const USER_AGENT: &str = concat!("bundlebot/", env!("CARGO_PKG_VERSION"));

/// Transport settings for a [`CatalogSession`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Per-request timeout; the only bound on a stalled lookup or download.
    pub timeout: Duration,
    pub max_redirects: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 5,
        }
    }
}

impl From<&PipelineConfig> for SessionOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            timeout: config.timeout,
            max_redirects: config.max_redirects,
        }
    }
}

/// One pooled HTTP client, opened at run start and released at run end.
#[derive(Debug)]
pub struct CatalogSession {
    client: Client,
}

impl CatalogSession {
    /// Open a session with the given transport settings.
    pub fn open(options: &SessionOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .timeout(options.timeout)
            .build()
            .map_err(|e| BundleError::Network(format!("failed to build HTTP client: {e}")))?;

        debug!(timeout_ms = options.timeout.as_millis(), "catalog session opened");
        Ok(Self { client })
    }

    /// The underlying client. Clones share the same connection pool.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Release the session.
    pub fn close(self) {
        drop(self.client);
        info!("catalog session closed");
    }
}
