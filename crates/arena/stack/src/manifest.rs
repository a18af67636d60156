//! The synthesized manifest
//!
//! A manifest is the only thing handed to the provisioning engine: every
//! resource in construction order with its kind, properties, dependency
//! edges and expanded role policy, followed by the outputs.

use crate::config::ManifestFormat;
use crate::error::StackResult;
use crate::graph::{ResourceNode, ResourceSpec};
use crate::outputs::OutputEntry;
use crate::stack::Stack;
use arena_types::{LogicalId, PolicyStatement, RemovalPolicy, ResourceKind, StackId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::info;

/// One resource as the provisioning engine sees it
#[derive(Debug, Clone, Serialize)]
pub struct ManifestResource {
    pub logical_id: LogicalId,
    pub kind: ResourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removal_policy: Option<RemovalPolicy>,
    pub depends_on: Vec<LogicalId>,
    /// Resources the role policy attachment waits for.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub policy_depends_on: Vec<LogicalId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub role_policy: Vec<PolicyStatement>,
    pub properties: ResourceSpec,
}

/// The declarative result of a successful declaration pass
#[derive(Debug, Clone, Serialize)]
pub struct StackManifest {
    pub stack_name: String,
    pub stack_id: StackId,
    pub synthesized_at: DateTime<Utc>,
    pub resources: Vec<ManifestResource>,
    pub outputs: Vec<OutputEntry>,
}

impl StackManifest {
    /// Snapshot a stack. Callers go through [`Stack::synth`], which
    /// validates the graph first.
    pub(crate) fn build(stack: &Stack) -> Self {
        let nodes = stack.nodes();
        let kinds: HashMap<&LogicalId, ResourceKind> =
            nodes.iter().map(|n| (n.logical_id(), n.kind())).collect();

        let resources = nodes
            .iter()
            .map(|node| {
                let (policy_depends_on, role_policy) = match &node.spec {
                    ResourceSpec::Function(target) => (
                        logical_ids(nodes, &target.policy_depends_on),
                        target.grants.role_policy(|id| kinds.get(id).copied()),
                    ),
                    _ => (Vec::new(), Vec::new()),
                };

                ManifestResource {
                    logical_id: node.logical_id().clone(),
                    kind: node.kind(),
                    removal_policy: node.spec.removal_policy(),
                    depends_on: logical_ids(nodes, &node.depends_on),
                    policy_depends_on,
                    role_policy,
                    properties: node.spec.clone(),
                }
            })
            .collect();

        Self {
            stack_name: stack.name().to_string(),
            stack_id: stack.id(),
            synthesized_at: Utc::now(),
            resources,
            outputs: stack.outputs().iter().cloned().collect(),
        }
    }

    pub fn resource(&self, logical_id: &str) -> Option<&ManifestResource> {
        self.resources
            .iter()
            .find(|r| r.logical_id.as_str() == logical_id)
    }

    pub fn output(&self, name: &str) -> Option<&OutputEntry> {
        self.outputs.iter().find(|o| o.name == name)
    }

    pub fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &ManifestResource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    pub fn to_json_pretty(&self) -> StackResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> StackResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn render(&self, format: ManifestFormat) -> StackResult<String> {
        match format {
            ManifestFormat::Json => self.to_json_pretty(),
            ManifestFormat::Yaml => self.to_yaml(),
        }
    }

    /// Render and write the manifest, creating parent directories.
    pub fn write_to(&self, path: &Path, format: ManifestFormat) -> StackResult<()> {
        let rendered = self.render(format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, rendered)?;
        info!(path = %path.display(), resources = self.resources.len(), "Wrote manifest");
        Ok(())
    }
}

fn logical_ids(nodes: &[ResourceNode], ordinals: &BTreeSet<usize>) -> Vec<LogicalId> {
    ordinals
        .iter()
        .filter_map(|o| nodes.get(*o))
        .map(|n| n.logical_id().clone())
        .collect()
}
