//! Stack error types

use arena_types::TopologyError;
use thiserror::Error;

/// Errors surfaced by the stack crate
///
/// Graph-validity failures stay `TopologyError`s; everything else here is
/// about reading configuration or rendering the manifest.
#[derive(Debug, Error)]
pub enum StackError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<toml::de::Error> for StackError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for stack operations
pub type StackResult<T> = std::result::Result<T, StackError>;
