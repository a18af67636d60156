//! Whole-graph checks run before synthesis
//!
//! Most invariants hold by construction; these checks cover what can only
//! be decided once the declaration pass is over (lifecycle routes) and
//! re-verify the ordering guarantees the provisioning engine relies on.

use crate::graph::{ResourceNode, ResourceSpec};
use crate::outputs::OutputRegistry;
use crate::stack::MANAGE_CONNECTIONS_ACTION;
use arena_types::{Attribute, Effect, Grant, LogicalId, ResourceRef, Result, TopologyError};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Run every finalization check.
pub fn validate_graph(nodes: &[ResourceNode], outputs: &OutputRegistry) -> Result<()> {
    check_lifecycle_routes(nodes)?;
    check_connection_grants(nodes)?;
    check_references(nodes, outputs)?;
    check_acyclic(nodes)?;
    Ok(())
}

/// Every websocket api must bind `$connect` and `$disconnect`.
pub fn check_lifecycle_routes(nodes: &[ResourceNode]) -> Result<()> {
    for node in nodes {
        if let ResourceSpec::WebSocketApi(spec) = &node.spec {
            if let Some(route_key) = spec.routes.missing_lifecycle() {
                return Err(TopologyError::MissingLifecycleRoute {
                    surface: node.logical_id().to_string(),
                    route_key: route_key.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Every function bound to a route of a staged websocket api must be
/// allowed to manage connections under each of that api's stages.
pub fn check_connection_grants(nodes: &[ResourceNode]) -> Result<()> {
    for stage_node in nodes {
        let ResourceSpec::WebSocketStage(stage) = &stage_node.spec else {
            continue;
        };
        let api = stage.api.logical_id();
        let targets: BTreeSet<&LogicalId> = nodes
            .iter()
            .filter_map(|n| match &n.spec {
                ResourceSpec::WebSocketRoute(route) if &route.api == api => Some(&route.target),
                _ => None,
            })
            .collect();

        for target in targets {
            let granted = nodes
                .iter()
                .find(|n| n.logical_id() == target)
                .is_some_and(|n| match &n.spec {
                    ResourceSpec::Function(function) => function
                        .grants
                        .iter()
                        .any(|grant| manages_connections(grant, stage_node.logical_id())),
                    _ => false,
                });
            if !granted {
                return Err(TopologyError::MissingConnectionGrant {
                    function: target.to_string(),
                    stage: stage_node.logical_id().to_string(),
                });
            }
        }
    }
    Ok(())
}

fn manages_connections(grant: &Grant, stage: &LogicalId) -> bool {
    let Grant::Statement(statement) = grant else {
        return false;
    };
    statement.effect == Effect::Allow
        && statement.actions.iter().any(|a| a == MANAGE_CONNECTIONS_ACTION)
        && statement.resources.iter().any(|resource| {
            resource
                .references()
                .iter()
                .any(|(r, attribute)| r.logical_id() == stage && *attribute == Attribute::Arn)
        })
}

/// Ordinary dependencies point at earlier nodes; role statement
/// dependencies and outputs point at nodes that exist.
pub fn check_references(nodes: &[ResourceNode], outputs: &OutputRegistry) -> Result<()> {
    for node in nodes {
        if let Some(dep) = node.depends_on.iter().find(|d| **d >= node.ordinal()) {
            return Err(TopologyError::dangling(
                node.logical_id().as_str(),
                describe(nodes, *dep),
            ));
        }

        if let ResourceSpec::Function(target) = &node.spec {
            if let Some(dep) = target.policy_depends_on.iter().find(|d| **d >= nodes.len()) {
                return Err(TopologyError::dangling(
                    node.logical_id().as_str(),
                    format!("#{dep}"),
                ));
            }
        }
    }

    let declared: HashSet<_> = nodes.iter().map(|n| n.logical_id()).collect();
    for output in outputs.iter() {
        for (reference, _) in output.value.references() {
            let known = match reference {
                ResourceRef::Named(id) => declared.contains(id),
                ResourceRef::Handle(handle) => declared.contains(handle.logical_id()),
            };
            if !known {
                return Err(TopologyError::dangling(
                    output.name.as_str(),
                    reference.logical_id().as_str(),
                ));
            }
        }
    }
    Ok(())
}

/// Kahn's algorithm over the resource graph.
///
/// Each function with role statements contributes an extra vertex for its
/// role policy attachment, depending on the function and on every resource
/// its statements name.
pub fn check_acyclic(nodes: &[ResourceNode]) -> Result<()> {
    let mut deps: Vec<Vec<usize>> = nodes
        .iter()
        .map(|n| n.depends_on.iter().copied().collect())
        .collect();
    let mut labels: Vec<String> = nodes.iter().map(|n| n.logical_id().to_string()).collect();

    for node in nodes {
        if let ResourceSpec::Function(target) = &node.spec {
            if !target.policy_depends_on.is_empty() {
                let mut policy_deps = vec![node.ordinal()];
                policy_deps.extend(target.policy_depends_on.iter().copied());
                deps.push(policy_deps);
                labels.push(format!("{}Policy", node.logical_id()));
            }
        }
    }

    let total = deps.len();
    let mut in_degree = vec![0usize; total];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); total];
    for (vertex, vertex_deps) in deps.iter().enumerate() {
        for dep in vertex_deps {
            if *dep >= total {
                return Err(TopologyError::dangling(labels[vertex].as_str(), format!("#{dep}")));
            }
            in_degree[vertex] += 1;
            dependents[*dep].push(vertex);
        }
    }

    let mut ready: VecDeque<usize> = (0..total).filter(|v| in_degree[*v] == 0).collect();
    let mut visited = 0;
    while let Some(vertex) = ready.pop_front() {
        visited += 1;
        for dependent in &dependents[vertex] {
            in_degree[*dependent] -= 1;
            if in_degree[*dependent] == 0 {
                ready.push_back(*dependent);
            }
        }
    }

    if visited < total {
        let stuck = (0..total).find(|v| in_degree[*v] > 0).unwrap_or_default();
        return Err(TopologyError::CyclicDependency(labels[stuck].clone()));
    }
    Ok(())
}

fn describe(nodes: &[ResourceNode], ordinal: usize) -> String {
    nodes
        .get(ordinal)
        .map(|n| n.logical_id().to_string())
        .unwrap_or_else(|| format!("#{ordinal}"))
}
