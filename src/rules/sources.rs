//! Jurisdiction and hub definitions

use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use url::Url;

use super::error::{ConfigError, compile};
use crate::crawler::DiscoveryRules;

#[derive(Debug, Clone, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    states: Vec<JurisdictionDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct JurisdictionDef {
    code: String,
    #[serde(default)]
    hubs: Vec<HubDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct HubDef {
    name: String,
    url: String,
    #[serde(default)]
    allow_re: Option<String>,
    #[serde(default)]
    feed_url: Option<String>,
    #[serde(default)]
    sitemap_url: Option<String>,
}

/// A watched landing page and its discovery settings
#[derive(Debug, Clone)]
pub struct Hub {
    /// Upper-cased jurisdiction code
    pub jurisdiction: String,
    pub name: String,
    pub url: String,
    /// Lower-cased host of `url`
    pub host: String,
    pub allow: Regex,
    pub feed_url: Option<String>,
    pub sitemap_url: Option<String>,
}

impl Hub {
    /// Settings for running link discovery on this hub
    pub fn discovery_rules(&self) -> DiscoveryRules {
        DiscoveryRules {
            allow: Some(self.allow.clone()),
            feed_url: self.feed_url.clone(),
            sitemap_url: self.sitemap_url.clone(),
        }
    }
}

/// Parsed and validated `sources.yaml`
#[derive(Debug, Clone, Default)]
pub struct SourceRules {
    hubs: Vec<Hub>,
}

impl SourceRules {
    /// Parse and validate YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: SourcesFile = serde_yaml::from_str(yaml)?;

        let mut hubs = Vec::new();
        for state in file.states {
            let jurisdiction = state.code.trim().to_ascii_uppercase();
            if jurisdiction.is_empty() {
                return Err(ConfigError::Invalid("jurisdiction with empty code".to_string()));
            }

            for hub in state.hubs {
                let parsed = Url::parse(&hub.url)
                    .map_err(|e| ConfigError::Invalid(format!("hub '{}' has bad url {}: {e}", hub.name, hub.url)))?;
                let allow = compile(hub.allow_re.as_deref().unwrap_or(".*"))?;
                hubs.push(Hub {
                    jurisdiction: jurisdiction.clone(),
                    host: parsed.host_str().unwrap_or_default().to_ascii_lowercase(),
                    name: hub.name,
                    url: hub.url,
                    allow,
                    feed_url: hub.feed_url,
                    sitemap_url: hub.sitemap_url,
                });
            }
        }

        Ok(Self { hubs })
    }

    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Every configured hub, in file order
    pub fn hubs(&self) -> &[Hub] {
        &self.hubs
    }

    /// First hub whose host equals the URL's host or whose allow pattern matches the URL
    pub fn rules_for_url(&self, url: &str) -> Option<&Hub> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .unwrap_or_default();

        self.hubs
            .iter()
            .find(|hub| (!hub.host.is_empty() && hub.host == host) || hub.allow.is_match(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
states:
  - code: tx
    hubs:
      - name: Publications
        url: https://comptroller.texas.gov/taxes/publications/
        allow_re: "comptroller\\.texas\\.gov/taxes/.*"
  - code: CA
    hubs:
      - name: Notices
        url: https://www.cdtfa.ca.gov/formspubs/notices.htm
        allow_re: "cdtfa\\.ca\\.gov/.*\\.pdf$"
        feed_url: https://www.cdtfa.ca.gov/news/rss.xml
"#;

    #[test]
    fn test_parse_sources() {
        let rules = SourceRules::from_yaml_str(YAML).unwrap();
        assert_eq!(rules.hubs().len(), 2);
        assert_eq!(rules.hubs()[0].jurisdiction, "TX");
        assert_eq!(rules.hubs()[1].host, "www.cdtfa.ca.gov");

        let discovery = rules.hubs()[1].discovery_rules();
        assert_eq!(discovery.feed_url.as_deref(), Some("https://www.cdtfa.ca.gov/news/rss.xml"));
        assert!(discovery.sitemap_url.is_none());
    }

    #[test]
    fn test_rules_for_url() {
        let rules = SourceRules::from_yaml_str(YAML).unwrap();

        let by_host = rules.rules_for_url("https://comptroller.texas.gov/about/").unwrap();
        assert_eq!(by_host.name, "Publications");

        let by_pattern = rules.rules_for_url("https://mirror.cdtfa.ca.gov/forms/x.pdf").unwrap();
        assert_eq!(by_pattern.jurisdiction, "CA");

        assert!(rules.rules_for_url("https://unrelated.example.com/").is_none());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let yaml = "states:\n  - code: TX\n    hubs:\n      - name: Bad\n        url: https://e.gov/\n        allow_re: \"(unclosed\"\n";
        assert!(matches!(SourceRules::from_yaml_str(yaml), Err(ConfigError::Regex { .. })));
    }

    #[test]
    fn test_missing_allow_matches_everything() {
        let yaml = "states:\n  - code: FL\n    hubs:\n      - name: Any\n        url: https://floridarevenue.com/\n";
        let rules = SourceRules::from_yaml_str(yaml).unwrap();
        assert!(rules.hubs()[0].allow.is_match("https://anything/"));
    }
}
