//! Hub discovery job: grow the worklist from configured hubs

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use tracing::{info, instrument, warn};
use url::Url;

use super::worklist::{append_worklist, parse_worklist};
use crate::crawler::{LinkDiscoverer, filter_candidates};
use crate::rules::{ConfigError, Hub, SourceRules};

/// Links for one hub, falling back to its configured feed when discovery finds nothing
async fn hub_links(discoverer: &LinkDiscoverer, hub: &Hub) -> Vec<String> {
    let discovered = match discoverer.discover(&hub.url, &hub.discovery_rules()).await {
        Ok(links) => links,
        Err(e) => {
            warn!(hub = %hub.url, error = %e, "Hub discovery failed");
            Vec::new()
        }
    };
    if !discovered.is_empty() {
        return discovered;
    }

    let (Some(feed), Ok(base)) = (hub.feed_url.as_ref(), Url::parse(&hub.url)) else {
        return discovered;
    };
    info!(hub = %hub.url, feed = %feed, "Nothing discovered, reading configured feed directly");
    filter_candidates(&base, discoverer.feed_links(feed).await, None)
}

/// Discover URLs from every hub in `rules` and append the new ones to `worklist`.
///
/// New URLs are appended sorted, at most `max_new` of them when set. A
/// missing worklist is treated as empty and created. Returns the URLs
/// appended.
#[instrument(skip(discoverer, rules), fields(worklist = %worklist.display()))]
pub async fn discover_hubs(
    discoverer: &LinkDiscoverer,
    rules: &SourceRules,
    worklist: &Path,
    max_new: Option<usize>,
) -> Result<Vec<String>, ConfigError> {
    let existing: HashSet<String> = match std::fs::read(worklist) {
        Ok(bytes) => parse_worklist(&String::from_utf8_lossy(&bytes)).into_iter().collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
        Err(e) => return Err(ConfigError::read(worklist, e)),
    };
    info!(existing = existing.len(), "Loaded worklist");

    let mut added = BTreeSet::new();
    for hub in rules.hubs() {
        let links = hub_links(discoverer, hub).await;
        let fresh: Vec<String> = links.into_iter().filter(|u| !existing.contains(u)).collect();
        info!(
            jurisdiction = %hub.jurisdiction,
            hub = %hub.name,
            new = fresh.len(),
            "Hub processed"
        );
        added.extend(fresh);
    }

    let mut to_write: Vec<String> = added.into_iter().collect();
    if let Some(max) = max_new {
        to_write.truncate(max);
    }

    let appended = append_worklist(worklist, &to_write)?;
    info!(appended, total = existing.len() + appended, "Worklist updated");
    Ok(to_write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::{CrawlSession, CrawlerConfig, Fetcher, RetryPolicy};
    use crate::pipeline::load_worklist;
    use mockito::Server;
    use std::time::Duration;
    use tempfile::tempdir;

    fn discoverer() -> LinkDiscoverer {
        let config = CrawlerConfig::builder()
            .default_delay(Duration::ZERO)
            .retry(RetryPolicy::no_retry())
            .build();
        LinkDiscoverer::new(Fetcher::new(CrawlSession::shared(config).unwrap()))
    }

    #[tokio::test]
    async fn test_appends_sorted_new_urls() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _hub = server
            .mock("GET", "/taxes/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<html><body>
<a href="/taxes/notices/zeta.html">Zeta</a>
<a href="/taxes/notices/alpha.html">Alpha</a>
<a href="/taxes/notices/known.html">Known</a>
<a href="/careers/">Careers</a>
<a href="/elsewhere/page.html">Elsewhere</a>
</body></html>"#,
            )
            .create_async()
            .await;

        let yaml = format!(
            "states:\n  - code: tx\n    hubs:\n      - name: Comptroller\n        url: \"{base}/taxes/\"\n        allow_re: \"/taxes/notices/\"\n"
        );
        let rules = SourceRules::from_yaml_str(&yaml).unwrap();

        let dir = tempdir().unwrap();
        let worklist = dir.path().join("urls.txt");
        std::fs::write(&worklist, format!("# seeds\n{base}/taxes/notices/known.html\n")).unwrap();

        let appended = discover_hubs(&discoverer(), &rules, &worklist, None).await.unwrap();
        assert_eq!(
            appended,
            vec![
                format!("{base}/taxes/notices/alpha.html"),
                format!("{base}/taxes/notices/zeta.html"),
            ]
        );
        assert_eq!(load_worklist(&worklist).unwrap().len(), 3);

        // nothing new the second time round
        let again = discover_hubs(&discoverer(), &rules, &worklist, None).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_feed_fallback_and_cap() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _hub = server.mock("GET", "/news/").with_status(404).create_async().await;
        let _feed = server
            .mock("GET", "/news.rss")
            .with_status(200)
            .with_header("content-type", "application/rss+xml")
            .with_body(format!(
                r#"<rss><channel>
<item><link>{base}/press/b.html</link></item>
<item><link>{base}/press/a.html</link></item>
<item><link>{base}/press/c.html</link></item>
</channel></rss>"#
            ))
            .create_async()
            .await;

        // the allow pattern rejects every feed entry, so only the fallback finds them
        let yaml = format!(
            "states:\n  - code: fl\n    hubs:\n      - name: Revenue\n        url: \"{base}/news/\"\n        allow_re: \"/bulletins/\"\n        feed_url: \"{base}/news.rss\"\n"
        );
        let rules = SourceRules::from_yaml_str(&yaml).unwrap();

        let dir = tempdir().unwrap();
        let worklist = dir.path().join("new-urls.txt");

        let appended = discover_hubs(&discoverer(), &rules, &worklist, Some(2)).await.unwrap();
        assert_eq!(
            appended,
            vec![format!("{base}/press/a.html"), format!("{base}/press/b.html")]
        );
        assert_eq!(load_worklist(&worklist).unwrap(), appended);
    }
}
