//! Arena Types - resource declarations for the game service topology
//!
//! The arena stack is a declaration, not an application: it describes the
//! tables, identity directory, compute functions, API surfaces and static
//! hosting that a provisioning engine turns into live infrastructure.
//!
//! ## Architectural Boundaries
//!
//! - **arena-types** owns: identifiers, handles, value expressions, and the
//!   property structs of every resource kind with their local bounds checks
//! - **arena-stack** owns: construction order, reference resolution, route
//!   tables, grant sets, and the synthesized manifest
//! - **Provisioning engine** (external) owns: applying the manifest, diffing,
//!   rollback and parallelism
//!
//! ## Key Concepts
//!
//! - **LogicalId**: Stack-unique construct identifier of a declared resource
//! - **ResourceHandle**: Proof that a resource was declared in a given stack
//! - **ValueExpr**: Deferred value (literal, resource attribute, or join)
//!   resolved by the provisioning engine
//! - **Grant**: Resource-scoped access level or free-form policy statement

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod api;
pub mod compute;
pub mod error;
pub mod expr;
pub mod handle;
pub mod identity;
pub mod ids;
pub mod policy;
pub mod site;
pub mod storage;

// Re-export main types
pub use api::{
    CorsPolicy, HttpMethod, RestApiProps, RouteKey, StageProps, WebSocketApiProps,
};
pub use compute::{CodeRef, EntryPoint, FunctionProps, Runtime};
pub use error::{Result, TopologyError};
pub use expr::{Attribute, ResourceRef, ValueExpr};
pub use handle::{
    BucketHandle, DistributionHandle, FunctionHandle, IdentityPoolHandle, ResourceHandle,
    RestApiHandle, RestRouteHandle, StageHandle, TableHandle, UserPoolClientHandle,
    UserPoolHandle, WebSocketApiHandle, WebSocketRouteHandle,
};
pub use identity::{
    AuthFlows, IdentityPoolProps, IdentityProvider, PasswordPolicy, SignInAliases,
    UserPoolClientProps, UserPoolProps,
};
pub use ids::{LogicalId, ResourceKind, StackId};
pub use policy::{AccessLevel, Effect, Grant, PolicyStatement, RemovalPolicy};
pub use site::{BucketProps, DistributionProps, ViewerProtocolPolicy};
pub use storage::{AttributeType, CapacityMode, KeyAttribute, TableProps};
