//! Permissions and teardown dispositions

use crate::expr::ValueExpr;
use crate::ids::LogicalId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the provisioning engine does with a resource when the stack is torn down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Delete the resource together with the stack.
    #[default]
    Destroy,
    /// Orphan the resource and keep its data.
    Retain,
}

/// Resource-scoped permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Read,
    Write,
    ReadWrite,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::Write => f.write_str("write"),
            Self::ReadWrite => f.write_str("read-write"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

/// Free-form permission statement attached to a function's role
///
/// Resource patterns are value expressions, so a statement may name a
/// resource whose identity is only known after provisioning (a stage ARN).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PolicyStatement {
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<ValueExpr>,
}

impl PolicyStatement {
    pub fn allow(
        actions: impl IntoIterator<Item = impl Into<String>>,
        resources: impl IntoIterator<Item = ValueExpr>,
    ) -> Self {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().collect(),
        }
    }

    pub fn deny(
        actions: impl IntoIterator<Item = impl Into<String>>,
        resources: impl IntoIterator<Item = ValueExpr>,
    ) -> Self {
        Self {
            effect: Effect::Deny,
            ..Self::allow(actions, resources)
        }
    }
}

/// One entry in a function's grant set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Grant {
    /// Access level on a declared table, bucket or user pool.
    Resource {
        resource: LogicalId,
        level: AccessLevel,
    },
    /// Free-form statement, possibly referencing later declarations.
    Statement(PolicyStatement),
}

impl Grant {
    pub fn resource(resource: LogicalId, level: AccessLevel) -> Self {
        Self::Resource { resource, level }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource { resource, level } => write!(f, "{level} on {resource}"),
            Self::Statement(statement) => {
                write!(f, "{:?} {}", statement.effect, statement.actions.join(","))?;
                for resource in &statement.resources {
                    write!(f, " {resource}")?;
                }
                Ok(())
            }
        }
    }
}
