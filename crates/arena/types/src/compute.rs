//! Compute function declarations
//!
//! A function is an opaque code location plus an entry point. What it does
//! at invocation time is outside the stack; the stack only decides which
//! environment bindings and grants it receives.

use crate::error::{Result, TopologyError};
use crate::expr::ValueExpr;
use crate::ids::LogicalId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(900);

/// Environment keys with this prefix are reserved by the platform.
pub const RESERVED_ENV_PREFIX: &str = "AWS_";

/// Where the packaged logic lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeRef {
    /// Local directory bundled by the provisioning engine.
    Asset(String),
    /// Pre-uploaded archive.
    Bucket { bucket: String, key: String },
}

impl fmt::Display for CodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asset(path) => write!(f, "asset:{path}"),
            Self::Bucket { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// Execution runtime for the packaged logic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Runtime {
    #[default]
    #[serde(rename = "nodejs18.x")]
    Nodejs18,
    #[serde(rename = "nodejs20.x")]
    Nodejs20,
    #[serde(rename = "python3.12")]
    Python312,
    #[serde(rename = "provided.al2023")]
    ProvidedAl2023,
}

/// Runtime plus the handler symbol the runtime invokes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub runtime: Runtime,
    pub handler: String,
}

impl EntryPoint {
    pub fn new(runtime: Runtime, handler: impl Into<String>) -> Self {
        Self {
            runtime,
            handler: handler.into(),
        }
    }
}

impl Default for EntryPoint {
    fn default() -> Self {
        Self::new(Runtime::default(), "index.handler")
    }
}

/// Declaration of a compute function
///
/// Environment entries are kept in declaration order; the stack rejects
/// repeated keys instead of letting a later entry shadow an earlier one.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    pub code: CodeRef,
    pub entry_point: EntryPoint,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    pub environment: Vec<(String, ValueExpr)>,
}

impl FunctionProps {
    pub fn new(logical_id: LogicalId, code: CodeRef) -> Self {
        Self {
            logical_id,
            function_name: None,
            code,
            entry_point: EntryPoint::default(),
            timeout: Duration::from_secs(3),
            environment: Vec::new(),
        }
    }

    pub fn with_entry_point(mut self, entry_point: EntryPoint) -> Self {
        self.entry_point = entry_point;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<ValueExpr>) -> Self {
        self.environment.push((key.into(), value.into()));
        self
    }

    pub fn validate(&self) -> Result<()> {
        let resource = self.logical_id.as_str();

        if self.timeout < MIN_TIMEOUT || self.timeout > MAX_TIMEOUT {
            return Err(TopologyError::policy(
                resource,
                format!(
                    "timeout {}s outside {}-{}s",
                    self.timeout.as_secs_f64(),
                    MIN_TIMEOUT.as_secs(),
                    MAX_TIMEOUT.as_secs()
                ),
            ));
        }
        if self.timeout.subsec_nanos() != 0 {
            return Err(TopologyError::policy(
                resource,
                "timeout must be a whole number of seconds",
            ));
        }

        if self.entry_point.handler.trim().is_empty() {
            return Err(TopologyError::policy(resource, "handler is empty"));
        }

        match &self.code {
            CodeRef::Asset(path) if path.trim().is_empty() => {
                return Err(TopologyError::policy(resource, "code asset path is empty"));
            }
            CodeRef::Bucket { bucket, key } if bucket.is_empty() || key.is_empty() => {
                return Err(TopologyError::policy(
                    resource,
                    format!("code archive '{}' needs a bucket and a key", self.code),
                ));
            }
            _ => {}
        }

        let mut seen = BTreeSet::new();
        for (key, _) in &self.environment {
            validate_env_key(resource, key)?;
            if !seen.insert(key.as_str()) {
                return Err(TopologyError::duplicate(
                    format!("environment key of '{resource}'"),
                    key,
                ));
            }
        }

        Ok(())
    }
}

fn validate_env_key(resource: &str, key: &str) -> Result<()> {
    let mut chars = key.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(TopologyError::policy(
            resource,
            format!("environment key '{key}' is not a valid variable name"),
        ));
    }
    if key.starts_with(RESERVED_ENV_PREFIX) {
        return Err(TopologyError::policy(
            resource,
            format!("environment key '{key}' uses the reserved prefix {RESERVED_ENV_PREFIX}"),
        ));
    }
    Ok(())
}

/// Serde helper for whole-second durations
mod duration_secs {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> FunctionProps {
        FunctionProps::new(
            LogicalId::new("RpsGameFunction").unwrap(),
            CodeRef::Asset("../src/handlers/game".into()),
        )
        .with_timeout(Duration::from_secs(30))
    }

    #[test]
    fn default_entry_point_is_node_index_handler() {
        let entry = EntryPoint::default();
        assert_eq!(entry.runtime, Runtime::Nodejs18);
        assert_eq!(entry.handler, "index.handler");
        assert_eq!(
            serde_json::to_string(&entry.runtime).unwrap(),
            "\"nodejs18.x\""
        );
    }

    #[test]
    fn timeout_bounds_are_enforced() {
        assert!(props().validate().is_ok());
        assert!(props().with_timeout(Duration::ZERO).validate().is_err());
        assert!(props()
            .with_timeout(Duration::from_secs(901))
            .validate()
            .is_err());
        assert!(props()
            .with_timeout(Duration::from_millis(1500))
            .validate()
            .is_err());
    }

    #[test]
    fn env_keys_are_validated() {
        assert!(props().with_env("USERS_TABLE", "rps-users").validate().is_ok());
        assert!(props().with_env("1TABLE", "x").validate().is_err());
        assert!(props().with_env("AWS_REGION", "x").validate().is_err());
        assert!(props().with_env("USERS-TABLE", "x").validate().is_err());
    }

    #[test]
    fn code_locations_must_be_complete() {
        let archive = CodeRef::Bucket {
            bucket: "rps-artifacts".into(),
            key: "handlers/game.zip".into(),
        };
        assert_eq!(archive.to_string(), "s3://rps-artifacts/handlers/game.zip");

        let mut uploaded = props();
        uploaded.code = archive;
        assert!(uploaded.validate().is_ok());

        uploaded.code = CodeRef::Bucket {
            bucket: "rps-artifacts".into(),
            key: String::new(),
        };
        assert!(uploaded.validate().is_err());

        uploaded.code = CodeRef::Asset("  ".into());
        assert!(uploaded.validate().is_err());
    }

    #[test]
    fn repeated_env_key_is_a_duplicate() {
        let err = props()
            .with_env("USERS_TABLE", "a")
            .with_env("USERS_TABLE", "b")
            .validate()
            .unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateName { .. }));
    }

    #[test]
    fn timeout_serializes_in_seconds() {
        let json = serde_json::to_value(props()).unwrap();
        assert_eq!(json["timeout"], 30);
        assert_eq!(json["entry_point"]["handler"], "index.handler");
    }
}
