//! Topic rules document

use std::path::Path;

use serde::Deserialize;

use super::error::ConfigError;

/// Topic rules shipped with the crate
pub const DEFAULT_TOPIC_RULES: &str = include_str!("../../rules/topic_rules.yaml");

fn default_weight() -> u32 {
    1
}

/// One topic: a weight and OR'd clauses of AND'd terms
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TopicDef {
    pub name: String,

    #[serde(default = "default_weight")]
    pub weight: u32,

    #[serde(default)]
    pub any: Vec<Vec<String>>,
}

/// Parsed `topic_rules.yaml`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TopicRules {
    /// Patterns that force the General topic with score 0
    #[serde(default)]
    pub negatives: Vec<String>,

    /// Topics in tie-break order
    #[serde(default)]
    pub topics: Vec<TopicDef>,
}

impl TopicRules {
    /// Parse rules from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let rules: TopicRules = serde_yaml::from_str(yaml)?;
        for topic in &rules.topics {
            if topic.name.trim().is_empty() {
                return Err(ConfigError::Invalid("topic with empty name".to_string()));
            }
            if topic.any.iter().any(|clause| clause.is_empty()) {
                return Err(ConfigError::Invalid(format!("topic '{}' has an empty clause", topic.name)));
            }
        }
        Ok(rules)
    }

    /// Load rules from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    /// The bundled default rules
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_yaml_str(DEFAULT_TOPIC_RULES)
    }
}
