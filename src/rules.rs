//! # Rules Module
//!
//! Loading and validation of the two YAML rules documents: the jurisdiction
//! and hub list (`sources.yaml`) and the classifier's topic rules
//! (`topic_rules.yaml`). Both are validated up front so that a bad rules
//! file stops a run before any URL is processed.

mod error;
mod sources;
mod topics;

pub use error::ConfigError;
pub(crate) use error::compile_ci;
pub use sources::{Hub, SourceRules};
pub use topics::{DEFAULT_TOPIC_RULES, TopicDef, TopicRules};
