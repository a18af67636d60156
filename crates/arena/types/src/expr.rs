//! Deferred value expressions
//!
//! A `ValueExpr` names a value that only exists once the provisioning engine
//! has created the referenced resource (a table name, a stage ARN, a
//! distribution domain). The stack checks that every referenced resource was
//! declared and exposes the requested attribute; the engine does the rest.

use crate::handle::ResourceHandle;
use crate::ids::{LogicalId, ResourceKind};
use serde::Serialize;
use std::fmt;

/// Runtime attributes a resource exposes to later declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Attribute {
    Name,
    Arn,
    Id,
    Url,
    DomainName,
}

impl Attribute {
    /// Attributes exposed by each resource kind.
    pub fn exposed_by(kind: ResourceKind) -> &'static [Attribute] {
        use Attribute::*;
        match kind {
            ResourceKind::Table => &[Name, Arn],
            ResourceKind::UserPool => &[Id, Arn],
            ResourceKind::UserPoolClient => &[Id],
            ResourceKind::IdentityPool => &[Id],
            ResourceKind::Function => &[Name, Arn],
            ResourceKind::RestApi => &[Id, Url],
            ResourceKind::RestRoute | ResourceKind::WebSocketRoute => &[Id],
            ResourceKind::WebSocketApi => &[Id],
            ResourceKind::WebSocketStage => &[Name, Arn, Url],
            ResourceKind::Bucket => &[Name, Arn, DomainName],
            ResourceKind::Distribution => &[Id, DomainName],
        }
    }

    pub fn is_exposed_by(&self, kind: ResourceKind) -> bool {
        Self::exposed_by(kind).contains(self)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reference to a declared resource, by handle or by logical id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Handle(ResourceHandle),
    Named(LogicalId),
}

impl ResourceRef {
    /// Reference by logical id; the id is only checked when resolved.
    pub fn named(id: &LogicalId) -> Self {
        Self::Named(id.clone())
    }

    pub fn logical_id(&self) -> &LogicalId {
        match self {
            Self::Handle(handle) => handle.logical_id(),
            Self::Named(id) => id,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.logical_id(), f)
    }
}

impl From<ResourceHandle> for ResourceRef {
    fn from(handle: ResourceHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<&ResourceHandle> for ResourceRef {
    fn from(handle: &ResourceHandle) -> Self {
        Self::Handle(handle.clone())
    }
}

impl From<LogicalId> for ResourceRef {
    fn from(id: LogicalId) -> Self {
        Self::Named(id)
    }
}

/// A value resolved by the provisioning engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueExpr {
    /// Plain string known at declaration time.
    Literal(String),

    /// An attribute of a declared resource.
    Attr {
        resource: ResourceRef,
        attribute: Attribute,
    },

    /// Concatenation of the parts, in order.
    Join(Vec<ValueExpr>),
}

impl ValueExpr {
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    pub fn attr(resource: impl Into<ResourceRef>, attribute: Attribute) -> Self {
        Self::Attr {
            resource: resource.into(),
            attribute,
        }
    }

    pub fn join(parts: impl IntoIterator<Item = ValueExpr>) -> Self {
        Self::Join(parts.into_iter().collect())
    }

    /// Every resource reference in the expression, depth first.
    pub fn references(&self) -> Vec<(&ResourceRef, Attribute)> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<(&'a ResourceRef, Attribute)>) {
        match self {
            Self::Literal(_) => {}
            Self::Attr {
                resource,
                attribute,
            } => refs.push((resource, *attribute)),
            Self::Join(parts) => {
                for part in parts {
                    part.collect_references(refs);
                }
            }
        }
    }

    /// Rewrite every reference with `f`, keeping the expression shape.
    pub fn try_map_refs<E>(
        &self,
        f: &mut impl FnMut(&ResourceRef, Attribute) -> Result<ResourceRef, E>,
    ) -> Result<ValueExpr, E> {
        Ok(match self {
            Self::Literal(value) => Self::Literal(value.clone()),
            Self::Attr {
                resource,
                attribute,
            } => Self::Attr {
                resource: f(resource, *attribute)?,
                attribute: *attribute,
            },
            Self::Join(parts) => Self::Join(
                parts
                    .iter()
                    .map(|part| part.try_map_refs(f))
                    .collect::<Result<Vec<_>, E>>()?,
            ),
        })
    }
}

impl fmt::Display for ValueExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Attr {
                resource,
                attribute,
            } => write!(f, "${{{resource}.{attribute}}}"),
            Self::Join(parts) => {
                for part in parts {
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for ValueExpr {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for ValueExpr {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}
