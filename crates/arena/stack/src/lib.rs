//! Arena Stack - the resource-dependency and binding model
//!
//! A [`Stack`] is built in a single synchronous pass. Every declaration is
//! checked against what has already been declared, so the graph is a DAG by
//! construction:
//!
//! ```text
//! tables, user pool ─► clients ─► identity bridge
//!         │
//!         ▼
//!     functions ─► rest api / routes
//!         │      ─► websocket api / routes ─► stage
//!         ▲                                    │
//!         └──── role policy (second phase) ◄───┘
//! ```
//!
//! The only edge that may point "forward" is a free-form statement added to
//! a function's role after the resource it names exists (for example the
//! permission to push messages to connections under a websocket stage).
//!
//! The first invalid declaration latches the stack: every later call,
//! including [`Stack::synth`], returns that same error, so a failed pass can
//! never produce a manifest.
//!
//! ## Modules
//!
//! - [`stack`]: the builder
//! - [`routing`]: REST path tree and websocket route table
//! - [`grants`]: idempotent grant sets and their expansion into statements
//! - [`outputs`]: the output registry
//! - [`validation`]: whole-graph checks run before synthesis
//! - [`manifest`]: the serializable result handed to the provisioning engine
//! - [`config`]: TOML configuration for the game topology
//! - [`arena`]: the concrete RPS Battle Arena topology

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod arena;
pub mod config;
pub mod error;
pub mod grants;
pub mod graph;
pub mod manifest;
pub mod outputs;
pub mod routing;
pub mod stack;
pub mod validation;

// Re-exports
pub use arena::{declare_arena_stack, ArenaStack};
pub use config::{ManifestFormat, StackConfig};
pub use error::{StackError, StackResult};
pub use grants::GrantSet;
pub use graph::{ComputeTarget, ResourceNode, ResourceSpec};
pub use manifest::{ManifestResource, StackManifest};
pub use outputs::{OutputEntry, OutputRegistry};
pub use routing::{RestRoute, RestRouteTree, WebSocketRouteTable};
pub use stack::Stack;

pub use arena_types as types;
