//! Construction-time errors
//!
//! Every error here is detected while the graph is being declared, before
//! anything is handed to the provisioning engine. The first error aborts the
//! declaration pass.

use thiserror::Error;

/// Graph-validity errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// Two resources in the same naming scope share a name.
    #[error("duplicate {scope} name '{name}'")]
    DuplicateName { scope: String, name: String },

    /// A binding, grant, route target or output points at nothing declared.
    #[error("'{from}' references '{reference}', which does not resolve to a declared resource")]
    DanglingReference { from: String, reference: String },

    /// Two routes claim the same (path, method) or route key.
    #[error("route conflict on '{surface}': {route}")]
    RouteConflict { surface: String, route: String },

    /// A declared attribute lies outside platform-accepted bounds.
    #[error("policy violation on '{resource}': {reason}")]
    PolicyViolation { resource: String, reason: String },

    /// An asynchronous surface lacks `$connect` or `$disconnect`.
    #[error("websocket api '{surface}' is missing lifecycle route '{route_key}'")]
    MissingLifecycleRoute { surface: String, route_key: String },

    /// A function bound to a staged websocket api cannot address its
    /// connections.
    #[error("function '{function}' serves routes of stage '{stage}' but cannot manage its connections")]
    MissingConnectionGrant { function: String, stage: String },

    #[error("dependency cycle through '{0}'")]
    CyclicDependency(String),
}

impl TopologyError {
    pub fn duplicate(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            scope: scope.into(),
            name: name.into(),
        }
    }

    pub fn dangling(from: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::DanglingReference {
            from: from.into(),
            reference: reference.into(),
        }
    }

    pub fn route_conflict(surface: impl Into<String>, route: impl Into<String>) -> Self {
        Self::RouteConflict {
            surface: surface.into(),
            route: route.into(),
        }
    }

    pub fn policy(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyViolation {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for declaration operations
pub type Result<T> = std::result::Result<T, TopologyError>;
