//! # Polite Crawler Module
//!
//! This module provides everything that talks to remote web servers: the
//! robots.txt gate, per-domain throttling, the retrying fetcher with its
//! headless render fallback, and hub link discovery through feeds, sitemaps
//! and page anchors.
//!
//! ## Key Components
//!
//! - `CrawlSession`: Explicit context holding the HTTP client, robots cache and throttle
//! - `RobotsGate`: Lazily cached robots.txt rules per domain
//! - `Throttle`: Minimum spacing between requests to one domain
//! - `Fetcher`: Robots check, throttle, retried GET and render fallback
//! - `LinkDiscoverer`: Candidate document URLs from a hub page
//!
//! ## Features
//!
//! - robots.txt groups, wildcards, crawl-delay and sitemap declarations
//! - Bounded exponential backoff for timeouts, connection errors, 5xx and 429
//! - Chromium render fallback for pages populated by client-side scripts
//! - RSS/Atom feed parsing and bounded sitemap-index traversal
//! - Junk-link and allow-pattern filtering with order-stable dedup

mod config;
mod discover;
mod error;
mod feeds;
mod fetch;
mod render;
mod retry;
mod robots;
mod session;
mod throttle;

pub use config::{CrawlerConfig, CrawlerConfigBuilder, RenderMode};
pub use discover::{DiscoveryRules, LinkDiscoverer, filter_candidates, is_junk};
pub use error::CrawlError;
pub use feeds::{Sitemap, parse_feed, parse_sitemap};
pub use fetch::{FetchedResponse, Fetcher, looks_html};
pub use render::{ChromiumRenderer, Renderer};
pub use retry::{RetryPolicy, retry};
pub use robots::{RobotsGate, RobotsRules};
pub use session::CrawlSession;
pub use throttle::Throttle;
