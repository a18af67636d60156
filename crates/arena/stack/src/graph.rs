//! Nodes of the resource graph
//!
//! Nodes are stored in construction order; a node's ordinal is its index.
//! `depends_on` holds the ordinals of every resource the node's properties
//! reference, all of which were declared earlier.

use crate::grants::GrantSet;
use crate::routing::{RestRouteTree, WebSocketRouteTable};
use arena_types::{
    BucketProps, DistributionProps, FunctionProps, HttpMethod, IdentityPoolProps, LogicalId,
    RemovalPolicy, ResourceHandle, ResourceKind, RestApiProps, RouteKey, StageProps, TableProps,
    UserPoolClientProps, UserPoolProps, WebSocketApiProps,
};
use serde::Serialize;
use std::collections::BTreeSet;

/// A declared resource
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub handle: ResourceHandle,
    pub spec: ResourceSpec,
    pub depends_on: BTreeSet<usize>,
}

impl ResourceNode {
    pub fn ordinal(&self) -> usize {
        self.handle.ordinal()
    }

    pub fn logical_id(&self) -> &LogicalId {
        self.handle.logical_id()
    }

    pub fn kind(&self) -> ResourceKind {
        self.handle.kind()
    }
}

/// Kind-specific properties of a node
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResourceSpec {
    Table(TableProps),
    UserPool(UserPoolProps),
    UserPoolClient(UserPoolClientProps),
    IdentityPool(IdentityPoolProps),
    Function(ComputeTarget),
    RestApi(RestApiSpec),
    RestRoute(RestRouteSpec),
    WebSocketApi(WebSocketApiSpec),
    WebSocketRoute(WebSocketRouteSpec),
    WebSocketStage(StageProps),
    Bucket(BucketProps),
    Distribution(DistributionProps),
}

impl ResourceSpec {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Table(_) => ResourceKind::Table,
            Self::UserPool(_) => ResourceKind::UserPool,
            Self::UserPoolClient(_) => ResourceKind::UserPoolClient,
            Self::IdentityPool(_) => ResourceKind::IdentityPool,
            Self::Function(_) => ResourceKind::Function,
            Self::RestApi(_) => ResourceKind::RestApi,
            Self::RestRoute(_) => ResourceKind::RestRoute,
            Self::WebSocketApi(_) => ResourceKind::WebSocketApi,
            Self::WebSocketRoute(_) => ResourceKind::WebSocketRoute,
            Self::WebSocketStage(_) => ResourceKind::WebSocketStage,
            Self::Bucket(_) => ResourceKind::Bucket,
            Self::Distribution(_) => ResourceKind::Distribution,
        }
    }

    /// Teardown disposition, for kinds that hold data.
    pub fn removal_policy(&self) -> Option<RemovalPolicy> {
        match self {
            Self::Table(props) => Some(props.removal_policy),
            Self::UserPool(props) => Some(props.removal_policy),
            Self::IdentityPool(props) => Some(props.removal_policy),
            Self::Bucket(props) => Some(props.removal_policy),
            _ => None,
        }
    }
}

/// A function together with the grants attached to its role
#[derive(Debug, Clone, Serialize)]
pub struct ComputeTarget {
    /// Environment values are stored with every reference resolved to a
    /// logical id.
    #[serde(flatten)]
    pub props: FunctionProps,
    pub grants: GrantSet,
    /// Resources named by free-form role statements. These may be declared
    /// after the function and constrain only the role policy attachment.
    #[serde(skip)]
    pub policy_depends_on: BTreeSet<usize>,
}

impl ComputeTarget {
    pub fn new(props: FunctionProps) -> Self {
        Self {
            props,
            grants: GrantSet::new(),
            policy_depends_on: BTreeSet::new(),
        }
    }

    /// Environment as the flat key -> string map the function sees at
    /// invocation, with unresolved attributes rendered as placeholders.
    pub fn environment(&self) -> Vec<(&str, String)> {
        self.props
            .environment
            .iter()
            .map(|(key, value)| (key.as_str(), value.to_string()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestApiSpec {
    #[serde(flatten)]
    pub props: RestApiProps,
    pub routes: RestRouteTree,
}

/// One (path, method) binding on a REST surface
#[derive(Debug, Clone, Serialize)]
pub struct RestRouteSpec {
    pub api: LogicalId,
    pub path: String,
    pub method: HttpMethod,
    pub target: LogicalId,
}

#[derive(Debug, Clone, Serialize)]
pub struct WebSocketApiSpec {
    #[serde(flatten)]
    pub props: WebSocketApiProps,
    pub routes: WebSocketRouteTable,
    pub stages: BTreeSet<String>,
}

/// One route key binding on a WebSocket surface
#[derive(Debug, Clone, Serialize)]
pub struct WebSocketRouteSpec {
    pub api: LogicalId,
    pub route_key: RouteKey,
    pub target: LogicalId,
}
