//! Shared crawl context
//!
//! A `CrawlSession` owns the HTTP client, the robots cache and the
//! per-domain throttle. Fetchers and discoverers borrow it through an `Arc`,
//! so independent sessions never share politeness state.

use std::sync::Arc;

use tracing::debug;
use url::Url;

use super::config::CrawlerConfig;
use super::error::CrawlError;
use super::robots::RobotsGate;
use super::throttle::Throttle;

/// Cache key for per-domain state: host, plus the port when it is explicit
pub(crate) fn domain_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    }
}

/// Politeness state and HTTP client for one crawl
pub struct CrawlSession {
    client: reqwest::Client,
    config: CrawlerConfig,
    robots: RobotsGate,
    throttle: Throttle,
}

impl CrawlSession {
    /// Build a session from configuration
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| CrawlError::Other(format!("Failed to build HTTP client: {e}")))?;

        if !config.verify_tls {
            debug!("TLS certificate verification disabled");
        }

        let robots = RobotsGate::new(
            client.clone(),
            config.user_agent.clone(),
            config.robots_timeout,
            config.default_delay,
        );

        Ok(Self {
            client,
            config,
            robots,
            throttle: Throttle::new(),
        })
    }

    /// Build a session wrapped for sharing between tasks
    pub fn shared(config: CrawlerConfig) -> Result<Arc<Self>, CrawlError> {
        Self::new(config).map(Arc::new)
    }

    /// HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Crawler configuration
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Robots gate
    pub fn robots(&self) -> &RobotsGate {
        &self.robots
    }

    /// Whether the configured user agent may fetch `url`
    pub async fn allowed(&self, url: &Url) -> bool {
        self.robots.allowed(&self.config.user_agent, url).await
    }

    /// Wait out the domain's crawl delay before a request to `url`
    pub async fn pace(&self, url: &Url) {
        let delay = self.robots.crawl_delay(url).await;
        self.throttle.wait(url, delay).await;
    }
}
