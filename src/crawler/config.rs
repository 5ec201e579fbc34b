//! # Crawler Configuration Module
//!
//! This module provides configuration options for the polite fetcher and the
//! link discoverer: identity, TLS verification, per-domain spacing, timeouts,
//! retry policy and the headless render fallback. It uses a builder pattern
//! for flexible configuration.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: The main configuration struct with crawler parameters
//! - `CrawlerConfigBuilder`: Builder pattern implementation for easier configuration
//! - `RenderMode`: When the headless render fallback is consulted

use std::str::FromStr;
use std::time::Duration;

use super::retry::RetryPolicy;

/// When the headless render fallback is used for HTML responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Only when the fetched HTML carries too little text
    #[default]
    Auto,
    /// For every HTML response
    Always,
    /// Never
    Off,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(RenderMode::Auto),
            "always" => Ok(RenderMode::Always),
            "off" | "never" | "false" => Ok(RenderMode::Off),
            other => Err(format!("unknown render mode '{other}' (expected auto|always|off)")),
        }
    }
}

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// User agent to use for requests and robots.txt matching
    pub user_agent: String,

    /// Whether TLS certificates are verified
    pub verify_tls: bool,

    /// Minimum spacing between requests to one domain when robots.txt sets no crawl-delay
    pub default_delay: Duration,

    /// Timeout for robots.txt requests
    pub robots_timeout: Duration,

    /// Timeout for page, feed and sitemap requests
    pub fetch_timeout: Duration,

    /// Timeout for the headless render fallback
    pub render_timeout: Duration,

    /// Retry policy for transient network failures
    pub retry: RetryPolicy,

    /// Render fallback mode
    pub render_mode: RenderMode,

    /// Minimum non-whitespace characters before HTML is considered populated
    pub min_html_chars: usize,

    /// Maximum nesting depth followed through sitemap indexes
    pub sitemap_max_depth: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "bulletin-monitor/0.2".to_string(),
            verify_tls: true,
            default_delay: Duration::from_millis(500),
            robots_timeout: Duration::from_secs(8),
            fetch_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
            render_mode: RenderMode::Auto,
            min_html_chars: 200,
            sitemap_max_depth: 2,
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set whether TLS certificates are verified
    pub fn verify_tls(mut self, verify_tls: bool) -> Self {
        self.config.verify_tls = verify_tls;
        self
    }

    /// Set the default per-domain delay
    pub fn default_delay(mut self, default_delay: Duration) -> Self {
        self.config.default_delay = default_delay;
        self
    }

    /// Set the robots.txt timeout
    pub fn robots_timeout(mut self, robots_timeout: Duration) -> Self {
        self.config.robots_timeout = robots_timeout;
        self
    }

    /// Set the page fetch timeout
    pub fn fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.config.fetch_timeout = fetch_timeout;
        self
    }

    /// Set the render fallback timeout
    pub fn render_timeout(mut self, render_timeout: Duration) -> Self {
        self.config.render_timeout = render_timeout;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the render fallback mode
    pub fn render_mode(mut self, render_mode: RenderMode) -> Self {
        self.config.render_mode = render_mode;
        self
    }

    /// Set the minimum HTML text threshold
    pub fn min_html_chars(mut self, min_html_chars: usize) -> Self {
        self.config.min_html_chars = min_html_chars;
        self
    }

    /// Set the maximum sitemap nesting depth
    pub fn sitemap_max_depth(mut self, sitemap_max_depth: u32) -> Self {
        self.config.sitemap_max_depth = sitemap_max_depth;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }
}
