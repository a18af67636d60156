//! Handles to declared resources
//!
//! A handle is only ever minted by the stack that declared the resource. It
//! records the owning stack, the construction ordinal, the logical id and the
//! kind, so the stack can tell a live handle from a forged or foreign one.

use crate::error::TopologyError;
use crate::expr::{Attribute, ValueExpr};
use crate::ids::{LogicalId, ResourceKind, StackId};
use serde::{Serialize, Serializer};
use std::fmt;

/// Untyped handle to a declared resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    stack: StackId,
    ordinal: usize,
    logical_id: LogicalId,
    kind: ResourceKind,
}

impl ResourceHandle {
    /// Mint a handle. Called by the stack builder when a declaration succeeds.
    pub fn new(stack: StackId, ordinal: usize, logical_id: LogicalId, kind: ResourceKind) -> Self {
        Self {
            stack,
            ordinal,
            logical_id,
            kind,
        }
    }

    pub fn stack(&self) -> StackId {
        self.stack
    }

    /// Position in construction order.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn attr(&self, attribute: Attribute) -> ValueExpr {
        ValueExpr::attr(self, attribute)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.logical_id)
    }
}

impl Serialize for ResourceHandle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.logical_id.as_str())
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(ResourceHandle);

        impl $name {
            pub const KIND: ResourceKind = ResourceKind::$kind;

            /// Wrap an untyped handle, checking its kind.
            pub fn from_raw(handle: ResourceHandle) -> Option<Self> {
                Self::try_from(handle).ok()
            }

            pub fn raw(&self) -> &ResourceHandle {
                &self.0
            }

            pub fn logical_id(&self) -> &LogicalId {
                self.0.logical_id()
            }

            pub fn attr(&self, attribute: Attribute) -> ValueExpr {
                self.0.attr(attribute)
            }
        }

        impl TryFrom<ResourceHandle> for $name {
            type Error = TopologyError;

            fn try_from(handle: ResourceHandle) -> Result<Self, TopologyError> {
                if handle.kind() == Self::KIND {
                    Ok(Self(handle))
                } else {
                    Err(TopologyError::dangling(
                        handle.logical_id().as_str(),
                        format!("a {} handle (found {})", Self::KIND, handle.kind()),
                    ))
                }
            }
        }

        impl From<$name> for ResourceHandle {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl AsRef<ResourceHandle> for $name {
            fn as_ref(&self) -> &ResourceHandle {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

typed_handle!(
    /// Handle to a keyed table
    TableHandle => Table
);
typed_handle!(
    /// Handle to a user directory
    UserPoolHandle => UserPool
);
typed_handle!(
    /// Handle to an application registration against a user directory
    UserPoolClientHandle => UserPoolClient
);
typed_handle!(
    /// Handle to a federated identity bridge
    IdentityPoolHandle => IdentityPool
);
typed_handle!(
    /// Handle to a compute function
    FunctionHandle => Function
);
typed_handle!(RestApiHandle => RestApi);
typed_handle!(RestRouteHandle => RestRoute);
typed_handle!(WebSocketApiHandle => WebSocketApi);
typed_handle!(WebSocketRouteHandle => WebSocketRoute);
typed_handle!(
    /// Handle to a deployed, addressable instance of a websocket api
    StageHandle => WebSocketStage
);
typed_handle!(BucketHandle => Bucket);
typed_handle!(DistributionHandle => Distribution);

impl TableHandle {
    pub fn table_name(&self) -> ValueExpr {
        self.attr(Attribute::Name)
    }

    pub fn table_arn(&self) -> ValueExpr {
        self.attr(Attribute::Arn)
    }
}

impl UserPoolHandle {
    pub fn user_pool_id(&self) -> ValueExpr {
        self.attr(Attribute::Id)
    }
}

impl UserPoolClientHandle {
    pub fn client_id(&self) -> ValueExpr {
        self.attr(Attribute::Id)
    }
}

impl IdentityPoolHandle {
    pub fn identity_pool_id(&self) -> ValueExpr {
        self.attr(Attribute::Id)
    }
}

impl RestApiHandle {
    pub fn url(&self) -> ValueExpr {
        self.attr(Attribute::Url)
    }
}

impl StageHandle {
    pub fn url(&self) -> ValueExpr {
        self.attr(Attribute::Url)
    }

    pub fn arn(&self) -> ValueExpr {
        self.attr(Attribute::Arn)
    }
}

impl DistributionHandle {
    pub fn domain_name(&self) -> ValueExpr {
        self.attr(Attribute::DomainName)
    }
}
