//! Rule-based topic classification and title derivation

use lazy_static::lazy_static;
use regex::Regex;

use crate::rules::{ConfigError, TopicRules, compile_ci};

/// Topic used when no rule matches or a negative pattern fires
pub const GENERAL_TOPIC: &str = "General";

lazy_static! {
    static ref TITLE_PREFIX: Regex =
        Regex::new(r"(?i)^(?:notice|bulletin|update)[:\s-]+(.{10,120})$").expect("valid title pattern");
}

const MAX_TITLE_CHARS: usize = 140;

/// Topic and relevance score assigned to a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub topic: String,
    pub score: u32,
}

impl Classification {
    fn general(score: u32) -> Self {
        Self {
            topic: GENERAL_TOPIC.to_string(),
            score,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledTopic {
    name: String,
    weight: u32,
    clauses: Vec<Vec<Regex>>,
}

impl CompiledTopic {
    fn matches(&self, text: &str) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|term| term.is_match(text)))
    }
}

/// Compiled topic rules
#[derive(Debug, Clone)]
pub struct Classifier {
    negatives: Vec<Regex>,
    topics: Vec<CompiledTopic>,
}

impl Classifier {
    /// Compile rules; any bad pattern is a configuration error
    pub fn new(rules: &TopicRules) -> Result<Self, ConfigError> {
        let negatives = rules
            .negatives
            .iter()
            .map(|p| compile_ci(p))
            .collect::<Result<Vec<_>, _>>()?;

        let topics = rules
            .topics
            .iter()
            .map(|topic| {
                let clauses = topic
                    .any
                    .iter()
                    .map(|clause| clause.iter().map(|t| compile_ci(t)).collect::<Result<Vec<_>, _>>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CompiledTopic {
                    name: topic.name.clone(),
                    weight: topic.weight,
                    clauses,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self { negatives, topics })
    }

    /// Classifier over the bundled topic rules
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::new(&TopicRules::bundled()?)
    }

    /// Assign a topic and score.
    ///
    /// A negative match gives (General, 0). Otherwise the heaviest matching
    /// topic wins, earlier topics winning ties; no match gives (General, 1).
    pub fn classify(&self, text: &str) -> Classification {
        let text = text.to_lowercase();

        if self.negatives.iter().any(|n| n.is_match(&text)) {
            return Classification::general(0);
        }

        let mut best: Option<&CompiledTopic> = None;
        for topic in self.topics.iter().filter(|t| t.matches(&text)) {
            if best.is_none_or(|b| topic.weight > b.weight) {
                best = Some(topic);
            }
        }

        match best {
            Some(topic) => Classification {
                topic: topic.name.clone(),
                score: topic.weight,
            },
            None => Classification::general(1),
        }
    }
}

fn clip_title(line: &str) -> String {
    if line.chars().count() > MAX_TITLE_CHARS {
        let cut: String = line.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}…", cut.trim_end())
    } else {
        line.to_string()
    }
}

/// Human-facing title from normalized text.
///
/// A "notice:/bulletin:/update:" line wins, using what follows the prefix;
/// otherwise the first line longer than ten characters. Falls back to
/// "Untitled".
pub fn derive_title(text: &str) -> String {
    let lines = || text.lines().map(str::trim).filter(|l| !l.is_empty());

    if let Some(caps) = lines().find_map(|l| TITLE_PREFIX.captures(l)) {
        if let Some(rest) = caps.get(1) {
            return clip_title(rest.as_str().trim());
        }
    }

    lines()
        .find(|l| l.chars().count() > 10)
        .map(clip_title)
        .unwrap_or_else(|| "Untitled".to_string())
}
