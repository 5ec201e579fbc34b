//! Error types for rules loading

use std::path::PathBuf;

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for rules and settings documents
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The rules file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that was being read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The rules file is not valid YAML for its schema
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A pattern in the rules does not compile
    #[error("Invalid pattern '{pattern}': {source}")]
    Regex {
        /// The offending pattern
        pattern: String,
        /// Compilation error
        source: regex::Error,
    },

    /// Structurally valid but semantically wrong rules
    #[error("Invalid rules: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Compile a pattern, naming it in the error
pub(crate) fn compile(pattern: &str) -> Result<regex::Regex, ConfigError> {
    regex::Regex::new(pattern).map_err(|source| ConfigError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Compile a pattern that matches regardless of case
pub(crate) fn compile_ci(pattern: &str) -> Result<regex::Regex, ConfigError> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::Regex {
            pattern: pattern.to_string(),
            source,
        })
}

impl From<ConfigError> for CrateError {
    fn from(err: ConfigError) -> Self {
        CrateError::Config(err.to_string())
    }
}
