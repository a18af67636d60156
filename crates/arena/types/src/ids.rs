//! Identifiers for stacks and declared resources

use crate::error::TopologyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length of a logical id accepted by the provisioning engine.
pub const MAX_LOGICAL_ID_LEN: usize = 255;

/// Unique identifier for one declaration pass
///
/// Every handle carries the id of the stack that minted it, so a handle
/// leaking from another stack never resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId(Uuid);

impl StackId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stack:{}", self.0)
    }
}

/// Stack-unique construct identifier (e.g. `RpsUsersTable`)
///
/// Must start with an ASCII letter and contain only ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Parse and validate a logical id.
    pub fn new(id: impl Into<String>) -> Result<Self, TopologyError> {
        let id = id.into();
        validate_logical_id(&id)?;
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn validate_logical_id(id: &str) -> Result<(), TopologyError> {
    let Some(first) = id.chars().next() else {
        return Err(TopologyError::policy("<unnamed>", "logical id is empty"));
    };
    if !first.is_ascii_alphabetic() {
        return Err(TopologyError::policy(
            id,
            "logical id must start with an ASCII letter",
        ));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TopologyError::policy(
            id,
            "logical id may only contain ASCII letters and digits",
        ));
    }
    if id.len() > MAX_LOGICAL_ID_LEN {
        return Err(TopologyError::policy(
            id,
            format!("logical id exceeds {MAX_LOGICAL_ID_LEN} characters"),
        ));
    }

    Ok(())
}

/// Kinds of nodes in the resource graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Table,
    UserPool,
    UserPoolClient,
    IdentityPool,
    Function,
    RestApi,
    RestRoute,
    WebSocketApi,
    WebSocketRoute,
    WebSocketStage,
    Bucket,
    Distribution,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Table => "table",
            Self::UserPool => "user pool",
            Self::UserPoolClient => "user pool client",
            Self::IdentityPool => "identity pool",
            Self::Function => "function",
            Self::RestApi => "rest api",
            Self::RestRoute => "rest route",
            Self::WebSocketApi => "websocket api",
            Self::WebSocketRoute => "websocket route",
            Self::WebSocketStage => "websocket stage",
            Self::Bucket => "bucket",
            Self::Distribution => "distribution",
        };
        f.write_str(name)
    }
}
