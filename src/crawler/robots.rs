//! robots.txt rules and the per-domain robots gate
//!
//! Rules are fetched lazily on first access to a domain and cached for the
//! life of the session. A robots.txt that cannot be fetched yields an
//! allow-all rule set so a broken server never blocks the crawl.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use robotstxt::DefaultMatcher;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::session::domain_key;

/// Crawl-delay declared by one `User-agent` group
#[derive(Debug, Clone, Default)]
struct DelayGroup {
    agents: Vec<String>,
    crawl_delay: Option<Duration>,
}

/// Cached robots.txt for one domain.
///
/// Allow/deny decisions go through `robotstxt`; the body is additionally
/// scanned for `Crawl-delay` and `Sitemap`, which the matcher does not expose.
#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    body: String,
    groups: Vec<DelayGroup>,
    sitemaps: Vec<String>,
}

/// Product token of a user agent string, as robots.txt groups name it
fn product_token(user_agent: &str) -> String {
    user_agent
        .chars()
        .take_while(|c| c.is_ascii_alphabetic() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase()
}

impl RobotsRules {
    /// Rule set that allows everything and declares no delay or sitemaps
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse robots.txt content
    pub fn parse(content: &str) -> Self {
        let mut groups: Vec<DelayGroup> = Vec::new();
        let mut sitemaps = Vec::new();
        let mut in_agent_lines = false;

        for raw_line in content.lines() {
            let line = raw_line.split('#').next().unwrap_or_default().trim();
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();

            match directive.trim().to_ascii_lowercase().as_str() {
                "user-agent" => {
                    if !in_agent_lines {
                        groups.push(DelayGroup::default());
                    }
                    if let Some(group) = groups.last_mut() {
                        group.agents.push(value.to_ascii_lowercase());
                    }
                    in_agent_lines = true;
                }
                "crawl-delay" => {
                    in_agent_lines = false;
                    let delay = value
                        .parse::<f64>()
                        .ok()
                        .filter(|secs| secs.is_finite() && *secs >= 0.0)
                        .map(Duration::from_secs_f64);
                    if let (Some(group), Some(delay)) = (groups.last_mut(), delay) {
                        group.crawl_delay = Some(delay);
                    }
                }
                "sitemap" if !value.is_empty() => sitemaps.push(value.to_string()),
                "sitemap" => {}
                _ => in_agent_lines = false,
            }
        }

        Self {
            body: content.to_string(),
            groups,
            sitemaps,
        }
    }

    /// Whether `user_agent` may fetch `url`
    pub fn is_allowed(&self, user_agent: &str, url: &Url) -> bool {
        if self.body.trim().is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.body, user_agent, url.as_str())
    }

    /// Crawl-delay declared for `user_agent`, else the one declared for `*`
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        let token = product_token(user_agent);
        let named = |name: &str| {
            self.groups
                .iter()
                .filter(|g| g.agents.iter().any(|a| a == name))
                .find_map(|g| g.crawl_delay)
        };
        named(&token).or_else(|| named("*"))
    }

    /// Sitemap URLs declared anywhere in the file
    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// Lazily populated robots.txt cache, one rule set per domain
pub struct RobotsGate {
    client: reqwest::Client,
    user_agent: String,
    timeout: Duration,
    default_delay: Duration,
    cache: RwLock<HashMap<String, Arc<RobotsRules>>>,
}

impl RobotsGate {
    /// Create a gate that fetches robots.txt with the given client
    pub fn new(
        client: reqwest::Client,
        user_agent: impl Into<String>,
        timeout: Duration,
        default_delay: Duration,
    ) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            timeout,
            default_delay,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Rules for the domain of `url`, fetching them on first access
    pub async fn rules_for(&self, url: &Url) -> Arc<RobotsRules> {
        let domain = domain_key(url);
        if let Some(rules) = self.cache.read().await.get(&domain) {
            return rules.clone();
        }

        // concurrent first accesses may both fetch; last write wins
        let rules = Arc::new(self.fetch_rules(url, &domain).await);
        self.cache.write().await.insert(domain, rules.clone());
        rules
    }

    async fn fetch_rules(&self, url: &Url, domain: &str) -> RobotsRules {
        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(e) => {
                warn!("Cannot build robots.txt URL for {}: {}", domain, e);
                return RobotsRules::allow_all();
            }
        };

        let response = self
            .client
            .get(robots_url.as_str())
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    info!("robots.txt loaded for {}", domain);
                    RobotsRules::parse(&body)
                }
                Err(e) => {
                    warn!("robots.txt body unreadable for {}: {}", domain, e);
                    RobotsRules::allow_all()
                }
            },
            Ok(resp) => {
                debug!("robots.txt not available for {} (status {})", domain, resp.status());
                RobotsRules::allow_all()
            }
            Err(e) => {
                warn!("robots.txt fetch failed for {}: {}", domain, e);
                RobotsRules::allow_all()
            }
        }
    }

    /// Whether `user_agent` may fetch `url`
    pub async fn allowed(&self, user_agent: &str, url: &Url) -> bool {
        self.rules_for(url).await.is_allowed(user_agent, url)
    }

    /// Required spacing between requests to the domain of `url`
    pub async fn crawl_delay(&self, url: &Url) -> Duration {
        self.rules_for(url)
            .await
            .crawl_delay(&self.user_agent)
            .unwrap_or(self.default_delay)
    }

    /// Sitemaps declared by the domain of `url`
    pub async fn sitemaps(&self, url: &Url) -> Vec<String> {
        self.rules_for(url).await.sitemaps().to_vec()
    }

    /// Number of domains with cached rules
    pub async fn cached_domains(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_robots_parsing() {
        let content = r#"
User-agent: *
Disallow: /private/
Allow: /private/public/
Crawl-delay: 2

User-agent: bulletin-monitor
Disallow: /admin/
Crawl-delay: 1

Sitemap: https://example.gov/sitemap.xml
"#;

        let rules = RobotsRules::parse(content);
        let ua = "bulletin-monitor/0.2";

        // specific group replaces the wildcard group
        assert!(rules.is_allowed(ua, &url("https://example.gov/public/page.html")));
        assert!(!rules.is_allowed(ua, &url("https://example.gov/admin/settings")));
        assert!(rules.is_allowed(ua, &url("https://example.gov/private/test")));
        assert_eq!(rules.crawl_delay(ua), Some(Duration::from_secs(1)));

        // other agents fall back to *
        assert!(!rules.is_allowed("OtherBot/1.0", &url("https://example.gov/private/x")));
        assert!(rules.is_allowed("OtherBot/1.0", &url("https://example.gov/private/public/x")));
        assert_eq!(rules.crawl_delay("OtherBot"), Some(Duration::from_secs(2)));

        assert_eq!(rules.sitemaps(), ["https://example.gov/sitemap.xml"]);
    }

    #[test]
    fn test_robots_wildcards() {
        let content = "User-agent: *\nDisallow: /*.pdf$\nDisallow: /search\nAllow: /search/help\n";
        let rules = RobotsRules::parse(content);

        assert!(!rules.is_allowed("x", &url("https://e.gov/docs/manual.pdf")));
        assert!(rules.is_allowed("x", &url("https://e.gov/docs/manual.pdf.html")));
        assert!(!rules.is_allowed("x", &url("https://e.gov/search?q=tax")));
        assert!(rules.is_allowed("x", &url("https://e.gov/search/help")));
    }

    #[test]
    fn test_grouped_user_agents() {
        let content = "User-agent: a-bot\nUser-agent: bulletin-monitor\nDisallow: /\n";
        let rules = RobotsRules::parse(content);
        assert!(!rules.is_allowed("bulletin-monitor/0.2", &url("https://e.gov/anything")));
        assert!(rules.is_allowed("someone-else", &url("https://e.gov/anything")));
    }

    #[test]
    fn test_delay_requires_exact_product_token() {
        let content = "User-agent: bulletin\nCrawl-delay: 9\n\nUser-agent: *\nCrawl-delay: 4\n";
        let rules = RobotsRules::parse(content);
        assert_eq!(rules.crawl_delay("bulletin-monitor/0.2"), Some(Duration::from_secs(4)));
        assert_eq!(rules.crawl_delay("Bulletin/1.0"), Some(Duration::from_secs(9)));
        assert_eq!(product_token("bulletin-monitor/0.2 (+https://e.gov)"), "bulletin-monitor");
    }

    #[test]
    fn test_empty_rules_allow_everything() {
        let rules = RobotsRules::allow_all();
        assert!(rules.is_allowed("any", &url("https://e.gov/x")));
        assert_eq!(rules.crawl_delay("any"), None);
        assert!(rules.sitemaps().is_empty());
    }

    #[tokio::test]
    async fn test_gate_caches_per_domain() {
        let mut server = Server::new_async().await;
        let robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nDisallow: /secret\nCrawl-delay: 3\n")
            .expect(1)
            .create_async()
            .await;

        let gate = RobotsGate::new(
            reqwest::Client::new(),
            "bulletin-monitor/0.2",
            Duration::from_secs(8),
            Duration::from_millis(500),
        );

        let base = url(&server.url());
        let page = base.join("/page").unwrap();
        let secret = base.join("/secret/doc").unwrap();

        assert!(gate.allowed("bulletin-monitor/0.2", &page).await);
        assert!(!gate.allowed("bulletin-monitor/0.2", &secret).await);
        assert_eq!(gate.crawl_delay(&page).await, Duration::from_secs(3));
        assert_eq!(gate.cached_domains().await, 1);

        robots.assert_async().await;
    }

    #[tokio::test]
    async fn test_gate_failure_is_permissive() {
        let mut server = Server::new_async().await;
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(500)
            .create_async()
            .await;

        let gate = RobotsGate::new(
            reqwest::Client::new(),
            "bulletin-monitor/0.2",
            Duration::from_secs(8),
            Duration::from_millis(750),
        );

        let page = url(&server.url()).join("/anything").unwrap();
        assert!(gate.allowed("bulletin-monitor/0.2", &page).await);
        assert_eq!(gate.crawl_delay(&page).await, Duration::from_millis(750));
        assert!(gate.sitemaps(&page).await.is_empty());
    }
}
