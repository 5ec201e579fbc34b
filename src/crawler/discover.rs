//! # Link Discovery
//!
//! Turns a hub page into a list of candidate document URLs. Three
//! sub-sources are merged in priority order:
//!
//! 1. RSS/Atom feeds advertised in the hub's `<head>` (plus a configured feed)
//! 2. Sitemaps declared in robots.txt (plus a configured sitemap), followed
//!    through sitemap indexes up to a bounded depth
//! 3. Every anchor on the hub page
//!
//! Candidates are resolved to absolute URLs, junk-filtered, matched against
//! the hub's allow pattern, deduplicated (first occurrence wins) and finally
//! re-checked against robots.txt. A failing sub-source contributes nothing;
//! it never aborts discovery.

use std::collections::HashSet;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::CrawlError;
use super::feeds::{Sitemap, parse_feed, parse_sitemap};
use super::fetch::Fetcher;

lazy_static! {
    static ref JUNK_PATTERNS: Vec<Regex> = [
        r"(?i)^mailto:",
        r"(?i)^tel:",
        r"#.+$",
        r"(?i)/careers?(/|$)",
        r"(?i)/jobs?(/|$)",
        r"(?i)/about(-us)?(/|$)",
        r"(?i)/privacy(-policy)?(/|$)",
        r"(?i)/terms(-of-service)?(/|$)",
        r"(?i)/social|/facebook|/twitter|/linkedin",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid junk pattern"))
    .collect();
}

const FEED_TYPES: [&str; 2] = ["application/rss+xml", "application/atom+xml"];

/// Whether a URL is known never to be a monitored document
pub fn is_junk(url: &str) -> bool {
    JUNK_PATTERNS.iter().any(|p| p.is_match(url))
}

/// Per-hub discovery settings
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRules {
    /// Candidates must match this pattern; `None` keeps everything
    pub allow: Option<Regex>,

    /// Feed to parse in addition to those advertised by the hub page
    pub feed_url: Option<String>,

    /// Sitemap to follow in addition to those declared in robots.txt
    pub sitemap_url: Option<String>,
}

impl DiscoveryRules {
    /// Rules with only an allow pattern
    pub fn allowing(allow: Regex) -> Self {
        Self {
            allow: Some(allow),
            ..Self::default()
        }
    }
}

/// Links found on a hub page
#[derive(Debug, Default)]
struct HubLinks {
    feeds: Vec<String>,
    anchors: Vec<String>,
}

fn parse_hub(html: &str) -> Result<HubLinks, CrawlError> {
    let document = Html::parse_document(html);

    let feed_selector = Selector::parse("head link[rel][href]")
        .map_err(|e| CrawlError::HtmlParse(format!("Failed to parse feed selector: {}", e)))?;
    let anchor_selector = Selector::parse("a[href]")
        .map_err(|e| CrawlError::HtmlParse(format!("Failed to parse anchor selector: {}", e)))?;

    let feeds = document
        .select(&feed_selector)
        .filter(|el| {
            let rel = el.value().attr("rel").unwrap_or_default();
            let kind = el.value().attr("type").unwrap_or_default().trim().to_ascii_lowercase();
            rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("alternate"))
                && FEED_TYPES.contains(&kind.as_str())
        })
        .filter_map(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect();

    let anchors = document
        .select(&anchor_selector)
        .filter_map(|el| el.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .collect();

    Ok(HubLinks { feeds, anchors })
}

/// Resolve, junk-filter, allow-filter and deduplicate raw candidates
pub fn filter_candidates<I>(hub: &Url, raw: I, allow: Option<&Regex>) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for candidate in raw {
        let candidate = candidate.trim();
        if candidate.is_empty() || is_junk(candidate) {
            continue;
        }

        let Ok(resolved) = hub.join(candidate) else {
            debug!(candidate, "Unresolvable link");
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }

        let resolved = resolved.to_string();
        if is_junk(&resolved) {
            continue;
        }
        if allow.is_some_and(|re| !re.is_match(&resolved)) {
            continue;
        }
        if seen.insert(resolved.clone()) {
            out.push(resolved);
        }
    }

    out
}

/// Discovers candidate document URLs from hub pages
#[derive(Clone)]
pub struct LinkDiscoverer {
    fetcher: Fetcher,
}

impl LinkDiscoverer {
    /// Create a discoverer that fetches through `fetcher`
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Discover candidate URLs reachable from `hub_url`
    #[instrument(skip(self, rules), fields(hub = %hub_url))]
    pub async fn discover(&self, hub_url: &str, rules: &DiscoveryRules) -> Result<Vec<String>, CrawlError> {
        let hub = Url::parse(hub_url)?;
        let mut raw: Vec<String> = Vec::new();

        let hub_links = match self.fetch_hub(hub_url).await {
            Ok(links) => links,
            Err(e) => {
                warn!(error = %e, "Hub page fetch/parse failed");
                HubLinks::default()
            }
        };

        // 1) feeds
        let mut feeds: Vec<String> = hub_links
            .feeds
            .iter()
            .filter_map(|href| hub.join(href).ok().map(|u| u.to_string()))
            .collect();
        if let Some(feed) = rules.feed_url.as_ref() {
            if !feeds.contains(feed) {
                feeds.push(feed.clone());
            }
        }
        for feed in &feeds {
            raw.extend(self.feed_links(feed).await);
        }

        // 2) sitemaps
        let mut sitemaps = self.fetcher.session().robots().sitemaps(&hub).await;
        if let Some(sitemap) = rules.sitemap_url.as_ref() {
            if !sitemaps.contains(sitemap) {
                sitemaps.push(sitemap.clone());
            }
        }
        let mut visited = HashSet::new();
        for sitemap in sitemaps {
            raw.extend(self.sitemap_links(sitemap, 1, &mut visited).await);
        }

        // 3) anchors on the hub page
        raw.extend(hub_links.anchors);

        let candidates = filter_candidates(&hub, raw, rules.allow.as_ref());
        let total = candidates.len();

        let mut kept = Vec::with_capacity(total);
        for candidate in candidates {
            match Url::parse(&candidate) {
                Ok(parsed) if !self.fetcher.session().allowed(&parsed).await => {
                    debug!(url = %candidate, "Dropped by robots.txt");
                }
                _ => kept.push(candidate),
            }
        }

        info!(kept = kept.len(), candidates = total, "Hub discovery finished");
        Ok(kept)
    }

    async fn fetch_hub(&self, hub_url: &str) -> Result<HubLinks, CrawlError> {
        let response = self.fetcher.fetch(hub_url).await?;
        parse_hub(&response.text())
    }

    /// Entry links of one feed; failures yield no links
    pub async fn feed_links(&self, feed_url: &str) -> Vec<String> {
        debug!(feed = feed_url, "Parsing feed");
        let parsed = match self.fetcher.fetch(feed_url).await {
            Ok(response) => parse_feed(&response.text()),
            Err(e) => Err(e),
        };
        match parsed {
            Ok(links) => links,
            Err(e) => {
                warn!(feed = feed_url, error = %e, "Feed parse failed");
                Vec::new()
            }
        }
    }

    /// Page URLs reachable from one sitemap document.
    ///
    /// `depth` is 1 for a top-level sitemap. Index entries are followed only
    /// while `depth` is below the configured maximum, and every sitemap URL is
    /// visited at most once per discovery run.
    fn sitemap_links<'a>(
        &'a self,
        sitemap_url: String,
        depth: u32,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Vec<String>> {
        Box::pin(async move {
            if !visited.insert(sitemap_url.clone()) {
                debug!(sitemap = %sitemap_url, "Sitemap already visited");
                return Vec::new();
            }

            let parsed = match self.fetcher.fetch(&sitemap_url).await {
                Ok(response) => parse_sitemap(&response.text()),
                Err(e) => Err(e),
            };

            match parsed {
                Ok(Sitemap::UrlSet(locs)) => locs,
                Ok(Sitemap::Index(children)) => {
                    let max_depth = self.fetcher.session().config().sitemap_max_depth;
                    if depth >= max_depth {
                        debug!(sitemap = %sitemap_url, depth, "Sitemap depth bound reached");
                        return Vec::new();
                    }
                    let mut out = Vec::new();
                    for child in children {
                        out.extend(self.sitemap_links(child, depth + 1, visited).await);
                    }
                    out
                }
                Err(e) => {
                    warn!(sitemap = %sitemap_url, error = %e, "Sitemap parse failed");
                    Vec::new()
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::config::{CrawlerConfig, RenderMode};
    use crate::crawler::retry::RetryPolicy;
    use crate::crawler::session::CrawlSession;
    use mockito::Server;
    use std::time::Duration;

    fn discoverer() -> LinkDiscoverer {
        let config = CrawlerConfig::builder()
            .default_delay(Duration::ZERO)
            .render_mode(RenderMode::Off)
            .retry(RetryPolicy::no_retry())
            .build();
        LinkDiscoverer::new(Fetcher::new(CrawlSession::shared(config).unwrap()))
    }

    #[test]
    fn test_junk_patterns() {
        assert!(is_junk("mailto:help@tax.example.gov"));
        assert!(is_junk("TEL:+15551234"));
        assert!(is_junk("https://e.gov/page#section"));
        assert!(is_junk("https://e.gov/careers/"));
        assert!(is_junk("https://e.gov/Jobs"));
        assert!(is_junk("https://e.gov/about-us/team"));
        assert!(is_junk("https://e.gov/privacy-policy"));
        assert!(is_junk("https://e.gov/terms"));
        assert!(is_junk("https://e.gov/social/feed"));
        assert!(!is_junk("https://e.gov/news/sales-tax-rate-change.html"));
        assert!(!is_junk("https://e.gov/aboutface.pdf"));
    }

    #[test]
    fn test_filter_candidates_resolves_and_dedups() {
        let hub = Url::parse("https://tax.example.gov/news/").unwrap();
        let raw = vec![
            "/forms/st-1.pdf".to_string(),
            "//tax.example.gov/forms/st-1.pdf".to_string(),
            "bulletin.html".to_string(),
            "ftp://tax.example.gov/file".to_string(),
            "https://other.example.com/x.pdf".to_string(),
        ];
        let allow = Regex::new(r"tax\.example\.gov").unwrap();

        let out = filter_candidates(&hub, raw, Some(&allow));
        assert_eq!(
            out,
            vec![
                "https://tax.example.gov/forms/st-1.pdf",
                "https://tax.example.gov/news/bulletin.html",
            ]
        );
    }

    #[test]
    fn test_parse_hub_feeds_and_anchors() {
        let html = r#"<html><head>
<link rel="alternate" type="application/rss+xml" href="/news.rss">
<link rel="stylesheet" type="text/css" href="/style.css">
</head><body><a href="/a.html">A</a><a href="">empty</a></body></html>"#;

        let links = parse_hub(html).unwrap();
        assert_eq!(links.feeds, vec!["/news.rss"]);
        assert_eq!(links.anchors, vec!["/a.html"]);
    }

    #[tokio::test]
    async fn test_discovery_filters_junk_links() {
        let mut server = Server::new_async().await;
        let _hub = server
            .mock("GET", "/hub")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r##"<html><body>
<a href="mailto:help@tax.example.gov">Email</a>
<a href="#section">Jump</a>
<a href="/careers/">Careers</a>
<a href="/docs/bulletin-2024-01.pdf">Bulletin</a>
<a href="/docs/bulletin-2024-01.pdf">Bulletin again</a>
</body></html>"##,
            )
            .create_async()
            .await;

        let hub_url = format!("{}/hub", server.url());
        let links = discoverer()
            .discover(&hub_url, &DiscoveryRules::default())
            .await
            .unwrap();

        assert_eq!(links, vec![format!("{}/docs/bulletin-2024-01.pdf", server.url())]);
    }

    #[tokio::test]
    async fn test_discovery_applies_allow_pattern_and_robots() {
        let mut server = Server::new_async().await;
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nDisallow: /private/\n")
            .create_async()
            .await;
        let _hub = server
            .mock("GET", "/hub")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<a href="/private/memo.pdf">x</a><a href="/news/rates.pdf">y</a><a href="/news/index.html">z</a>"#,
            )
            .create_async()
            .await;

        let rules = DiscoveryRules::allowing(Regex::new(r"\.pdf$").unwrap());
        let hub_url = format!("{}/hub", server.url());
        let links = discoverer().discover(&hub_url, &rules).await.unwrap();

        assert_eq!(links, vec![format!("{}/news/rates.pdf", server.url())]);
    }

    #[tokio::test]
    async fn test_discovery_reads_feeds() {
        let mut server = Server::new_async().await;
        let _hub = server
            .mock("GET", "/hub")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<html><head><link rel="alternate" type="application/atom+xml" href="/feed.atom"></head><body></body></html>"#,
            )
            .create_async()
            .await;
        let feed_body = format!(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry><link href="{}/notices/42"/></entry></feed>"#,
            server.url()
        );
        let _feed = server
            .mock("GET", "/feed.atom")
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(feed_body)
            .create_async()
            .await;

        let hub_url = format!("{}/hub", server.url());
        let links = discoverer()
            .discover(&hub_url, &DiscoveryRules::default())
            .await
            .unwrap();

        assert_eq!(links, vec![format!("{}/notices/42", server.url())]);
    }

    #[tokio::test]
    async fn test_sitemap_cycle_terminates() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body(format!("User-agent: *\nSitemap: {base}/sitemap.xml\n"))
            .create_async()
            .await;
        let index = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body(format!(
                r#"<sitemapindex><sitemap><loc>{base}/sitemap.xml</loc></sitemap><sitemap><loc>{base}/pages.xml</loc></sitemap></sitemapindex>"#
            ))
            .expect(1)
            .create_async()
            .await;
        let _pages = server
            .mock("GET", "/pages.xml")
            .with_status(200)
            .with_body(format!(r#"<urlset><url><loc>{base}/doc/1.html</loc></url></urlset>"#))
            .create_async()
            .await;
        let _hub = server
            .mock("GET", "/hub")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body></body></html>")
            .create_async()
            .await;

        let hub_url = format!("{base}/hub");
        let links = discoverer()
            .discover(&hub_url, &DiscoveryRules::default())
            .await
            .unwrap();

        assert_eq!(links, vec![format!("{base}/doc/1.html")]);
        index.assert_async().await;
    }

    #[tokio::test]
    async fn test_sitemap_depth_bound() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _outer = server
            .mock("GET", "/outer.xml")
            .with_status(200)
            .with_body(format!(
                r#"<sitemapindex><sitemap><loc>{base}/inner.xml</loc></sitemap><sitemap><loc>{base}/shallow.xml</loc></sitemap></sitemapindex>"#
            ))
            .create_async()
            .await;
        let _shallow = server
            .mock("GET", "/shallow.xml")
            .with_status(200)
            .with_body(format!(r#"<urlset><url><loc>{base}/doc/shallow.html</loc></url></urlset>"#))
            .create_async()
            .await;
        let _inner = server
            .mock("GET", "/inner.xml")
            .with_status(200)
            .with_body(format!(
                r#"<sitemapindex><sitemap><loc>{base}/deep.xml</loc></sitemap></sitemapindex>"#
            ))
            .create_async()
            .await;
        let deep = server
            .mock("GET", "/deep.xml")
            .with_status(200)
            .with_body(format!(r#"<urlset><url><loc>{base}/doc/deep.html</loc></url></urlset>"#))
            .expect(0)
            .create_async()
            .await;
        let _hub = server
            .mock("GET", "/hub")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .create_async()
            .await;

        let rules = DiscoveryRules {
            sitemap_url: Some(format!("{base}/outer.xml")),
            ..DiscoveryRules::default()
        };
        let links = discoverer()
            .discover(&format!("{base}/hub"), &rules)
            .await
            .unwrap();

        assert_eq!(links, vec![format!("{base}/doc/shallow.html")]);
        deep.assert_async().await;
    }

    #[tokio::test]
    async fn test_hub_failure_still_uses_configured_feed() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _hub = server
            .mock("GET", "/hub")
            .with_status(404)
            .create_async()
            .await;
        let _feed = server
            .mock("GET", "/news.rss")
            .with_status(200)
            .with_body(format!(
                r#"<rss><channel><item><link>{base}/news/1.html</link></item></channel></rss>"#
            ))
            .create_async()
            .await;

        let rules = DiscoveryRules {
            feed_url: Some(format!("{base}/news.rss")),
            ..DiscoveryRules::default()
        };
        let links = discoverer()
            .discover(&format!("{base}/hub"), &rules)
            .await
            .unwrap();

        assert_eq!(links, vec![format!("{base}/news/1.html")]);
    }
}
