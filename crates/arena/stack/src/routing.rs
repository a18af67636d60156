//! Route tables of the API surfaces
//!
//! REST routes live in a tree keyed by path segment: declaring `GET /stats`
//! and `POST /stats` yields one `stats` node carrying two method bindings.
//! WebSocket routes are a flat table keyed by route key.

use arena_types::{HttpMethod, LogicalId, Result, RouteKey, TopologyError};
use serde::Serialize;
use std::collections::BTreeMap;

// ── Path parsing ───────────────────────────────────────────────────────

/// Whether a segment is a named placeholder such as `{userId}`.
pub fn is_placeholder(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Split a path template into validated segments. `/` is the root (no segments).
pub fn parse_path(surface: &str, path: &str) -> Result<Vec<String>> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(TopologyError::policy(
            surface,
            format!("route path '{path}' must start with '/'"),
        ));
    };
    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    for segment in rest.split('/') {
        validate_segment(surface, path, segment)?;
        segments.push(segment.to_string());
    }
    Ok(segments)
}

fn validate_segment(surface: &str, path: &str, segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(TopologyError::policy(
            surface,
            format!("route path '{path}' contains an empty segment"),
        ));
    }

    if is_placeholder(segment) {
        let name = &segment[1..segment.len() - 1];
        let mut chars = name.chars();
        let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(TopologyError::policy(
                surface,
                format!("placeholder '{segment}' in '{path}' is not a valid name"),
            ));
        }
        return Ok(());
    }

    let valid = segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'));
    if !valid {
        return Err(TopologyError::policy(
            surface,
            format!("segment '{segment}' in '{path}' contains invalid characters"),
        ));
    }
    Ok(())
}

fn format_path(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

// ── REST ───────────────────────────────────────────────────────────────

/// A node of the REST path tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct PathNode {
    pub segment: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub methods: BTreeMap<HttpMethod, LogicalId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PathNode>,
}

impl PathNode {
    fn new(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            ..Default::default()
        }
    }

    fn child(&self, segment: &str) -> Option<&PathNode> {
        self.children.iter().find(|c| c.segment == segment)
    }

    fn child_index(&self, segment: &str) -> Option<usize> {
        self.children.iter().position(|c| c.segment == segment)
    }
}

/// A flattened (path, method, target) binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestRoute {
    pub path: String,
    pub method: HttpMethod,
    pub target: LogicalId,
}

/// Path tree of one REST surface
#[derive(Debug, Clone, Serialize)]
pub struct RestRouteTree {
    /// A CORS policy installs a preflight `OPTIONS` on every node.
    preflight: bool,
    root: PathNode,
}

impl RestRouteTree {
    pub fn new(preflight: bool) -> Self {
        Self {
            preflight,
            root: PathNode::new(""),
        }
    }

    pub fn root(&self) -> &PathNode {
        &self.root
    }

    /// Check that binding `method` at `segments` would not conflict.
    pub fn check(&self, surface: &str, segments: &[String], method: HttpMethod) -> Result<()> {
        let path = format_path(segments);

        if self.preflight && method == HttpMethod::Options {
            return Err(TopologyError::route_conflict(
                surface,
                format!("OPTIONS {path} collides with the CORS preflight"),
            ));
        }

        let mut node = &self.root;
        for (depth, segment) in segments.iter().enumerate() {
            if is_placeholder(segment) {
                let sibling = node
                    .children
                    .iter()
                    .find(|c| is_placeholder(&c.segment) && &c.segment != segment);
                if let Some(sibling) = sibling {
                    return Err(TopologyError::route_conflict(
                        surface,
                        format!(
                            "{segment} conflicts with sibling {} under {}",
                            sibling.segment,
                            format_path(&segments[..depth])
                        ),
                    ));
                }
            }

            match node.child(segment) {
                Some(child) => node = child,
                // A new branch cannot collide with anything further down.
                None => return Ok(()),
            }
        }

        if let Some(target) = node.methods.get(&method) {
            return Err(TopologyError::route_conflict(
                surface,
                format!("{method} {path} is already bound to '{target}'"),
            ));
        }
        Ok(())
    }

    /// Bind `method` at `segments` to `target`, reusing existing path nodes.
    pub fn insert(
        &mut self,
        surface: &str,
        segments: &[String],
        method: HttpMethod,
        target: LogicalId,
    ) -> Result<()> {
        self.check(surface, segments, method)?;

        let mut node = &mut self.root;
        for segment in segments {
            let index = match node.child_index(segment) {
                Some(index) => index,
                None => {
                    node.children.push(PathNode::new(segment));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }
        node.methods.insert(method, target);
        Ok(())
    }

    /// Find the target serving a concrete request path.
    ///
    /// Literal segments take precedence over placeholders; a method without
    /// its own binding falls back to an `ANY` binding on the same node.
    pub fn resolve(&self, method: HttpMethod, path: &str) -> Option<&LogicalId> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        lookup(&self.root, &segments, method)
    }

    /// Every binding, depth first in declaration order.
    pub fn routes(&self) -> Vec<RestRoute> {
        let mut routes = Vec::new();
        collect_routes(&self.root, &mut Vec::new(), &mut routes);
        routes
    }

    /// Number of (path, method) bindings.
    pub fn len(&self) -> usize {
        self.routes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of path nodes below the root.
    pub fn node_count(&self) -> usize {
        fn count(node: &PathNode) -> usize {
            node.children.iter().map(|c| 1 + count(c)).sum()
        }
        count(&self.root)
    }
}

fn lookup<'a>(node: &'a PathNode, segments: &[&str], method: HttpMethod) -> Option<&'a LogicalId> {
    let Some((first, rest)) = segments.split_first() else {
        return node
            .methods
            .get(&method)
            .or_else(|| node.methods.get(&HttpMethod::Any));
    };

    let literal = node
        .children
        .iter()
        .find(|c| !is_placeholder(&c.segment) && c.segment == *first);
    if let Some(found) = literal.and_then(|c| lookup(c, rest, method)) {
        return Some(found);
    }

    node.children
        .iter()
        .filter(|c| is_placeholder(&c.segment))
        .find_map(|c| lookup(c, rest, method))
}

fn collect_routes(node: &PathNode, prefix: &mut Vec<String>, out: &mut Vec<RestRoute>) {
    for (method, target) in &node.methods {
        out.push(RestRoute {
            path: format_path(prefix),
            method: *method,
            target: target.clone(),
        });
    }
    for child in &node.children {
        prefix.push(child.segment.clone());
        collect_routes(child, prefix, out);
        prefix.pop();
    }
}

// ── WebSocket ──────────────────────────────────────────────────────────

/// Route table of one WebSocket surface
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct WebSocketRouteTable {
    routes: BTreeMap<RouteKey, LogicalId>,
}

impl WebSocketRouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, surface: &str, key: &RouteKey) -> Result<()> {
        if let Some(target) = self.routes.get(key) {
            return Err(TopologyError::route_conflict(
                surface,
                format!("route key {key} is already bound to '{target}'"),
            ));
        }
        Ok(())
    }

    pub fn insert(&mut self, surface: &str, key: RouteKey, target: LogicalId) -> Result<()> {
        self.check(surface, &key)?;
        self.routes.insert(key, target);
        Ok(())
    }

    /// Target for an inbound route key, falling back to `$default`.
    pub fn dispatch(&self, key: &str) -> Option<&LogicalId> {
        self.routes
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .or_else(|| {
                self.routes
                    .iter()
                    .find(|(k, _)| k.as_str() == RouteKey::DEFAULT)
            })
            .map(|(_, target)| target)
    }

    /// First lifecycle key with no binding, if any.
    pub fn missing_lifecycle(&self) -> Option<&'static str> {
        RouteKey::LIFECYCLE
            .into_iter()
            .find(|required| !self.routes.keys().any(|k| k.as_str() == *required))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouteKey, &LogicalId)> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn segments(path: &str) -> Vec<String> {
        parse_path("RpsRestApi", path).unwrap()
    }

    #[test]
    fn parses_paths_into_segments() {
        assert!(segments("/").is_empty());
        assert_eq!(segments("/stats/{userId}"), vec!["stats", "{userId}"]);
        assert!(parse_path("api", "stats").is_err());
        assert!(parse_path("api", "/stats//x").is_err());
        assert!(parse_path("api", "/stats/").is_err());
        assert!(parse_path("api", "/stats/{1d}").is_err());
        assert!(parse_path("api", "/stats/a b").is_err());
    }

    #[test]
    fn shared_segments_are_one_node() {
        let mut tree = RestRouteTree::new(false);
        tree.insert("api", &segments("/stats"), HttpMethod::Get, id("Game"))
            .unwrap();
        tree.insert("api", &segments("/stats"), HttpMethod::Post, id("Game"))
            .unwrap();
        tree.insert("api", &segments("/stats/{userId}"), HttpMethod::Get, id("Game"))
            .unwrap();

        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root().children[0].methods.len(), 2);
    }

    #[test]
    fn same_path_and_method_conflicts() {
        let mut tree = RestRouteTree::new(false);
        tree.insert("api", &segments("/leaderboard"), HttpMethod::Get, id("Game"))
            .unwrap();
        let err = tree
            .insert("api", &segments("/leaderboard"), HttpMethod::Get, id("Auth"))
            .unwrap_err();
        assert!(matches!(err, TopologyError::RouteConflict { .. }));
        assert!(err.to_string().contains("GET /leaderboard"));
        assert_eq!(tree.resolve(HttpMethod::Get, "/leaderboard"), Some(&id("Game")));
    }

    #[test]
    fn preflight_reserves_options() {
        let mut tree = RestRouteTree::new(true);
        let err = tree
            .insert("api", &segments("/auth"), HttpMethod::Options, id("Auth"))
            .unwrap_err();
        assert!(err.to_string().contains("preflight"));

        let mut tree = RestRouteTree::new(false);
        assert!(tree
            .insert("api", &segments("/auth"), HttpMethod::Options, id("Auth"))
            .is_ok());
    }

    #[test]
    fn differently_named_placeholder_siblings_conflict() {
        let mut tree = RestRouteTree::new(false);
        tree.insert("api", &segments("/stats/{userId}"), HttpMethod::Get, id("Game"))
            .unwrap();
        let err = tree
            .insert("api", &segments("/stats/{id}"), HttpMethod::Post, id("Game"))
            .unwrap_err();
        assert!(matches!(err, TopologyError::RouteConflict { .. }));
    }

    #[test]
    fn failed_insert_leaves_tree_unchanged() {
        let mut tree = RestRouteTree::new(false);
        tree.insert("api", &segments("/stats/{userId}"), HttpMethod::Get, id("Game"))
            .unwrap();
        let _ = tree.insert("api", &segments("/stats/{id}/games"), HttpMethod::Get, id("Game"));
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn resolve_prefers_literals_and_falls_back_to_any() {
        let mut tree = RestRouteTree::new(false);
        tree.insert("api", &segments("/stats/{userId}"), HttpMethod::Get, id("Game"))
            .unwrap();
        tree.insert("api", &segments("/stats/top"), HttpMethod::Get, id("Top"))
            .unwrap();
        tree.insert("api", &segments("/auth"), HttpMethod::Any, id("Auth"))
            .unwrap();

        assert_eq!(tree.resolve(HttpMethod::Get, "/stats/top"), Some(&id("Top")));
        assert_eq!(tree.resolve(HttpMethod::Get, "/stats/u-42"), Some(&id("Game")));
        assert_eq!(tree.resolve(HttpMethod::Delete, "/auth"), Some(&id("Auth")));
        assert_eq!(tree.resolve(HttpMethod::Post, "/stats/u-42"), None);
        assert_eq!(tree.resolve(HttpMethod::Get, "/unknown"), None);
    }

    #[test]
    fn resolve_backtracks_from_literal_to_placeholder() {
        let mut tree = RestRouteTree::new(false);
        tree.insert("api", &segments("/stats/top"), HttpMethod::Get, id("Top"))
            .unwrap();
        tree.insert("api", &segments("/stats/{userId}/games"), HttpMethod::Get, id("Game"))
            .unwrap();

        assert_eq!(
            tree.resolve(HttpMethod::Get, "/stats/top/games"),
            Some(&id("Game"))
        );
    }

    #[test]
    fn routes_lists_bindings_with_paths() {
        let mut tree = RestRouteTree::new(true);
        tree.insert("api", &segments("/auth"), HttpMethod::Post, id("Auth"))
            .unwrap();
        tree.insert("api", &segments("/stats/{userId}"), HttpMethod::Get, id("Game"))
            .unwrap();

        let routes = tree.routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].path, "/auth");
        assert_eq!(routes[1].path, "/stats/{userId}");
        assert_eq!(routes[1].method, HttpMethod::Get);
    }

    #[test]
    fn websocket_keys_are_unique() {
        let mut table = WebSocketRouteTable::new();
        table
            .insert("ws", RouteKey::parse("join_queue").unwrap(), id("Ws"))
            .unwrap();
        let err = table
            .insert("ws", RouteKey::parse("join_queue").unwrap(), id("Other"))
            .unwrap_err();
        assert!(matches!(err, TopologyError::RouteConflict { .. }));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn websocket_lifecycle_and_dispatch() {
        let mut table = WebSocketRouteTable::new();
        assert_eq!(table.missing_lifecycle(), Some("$connect"));

        table.insert("ws", RouteKey::connect(), id("Ws")).unwrap();
        assert_eq!(table.missing_lifecycle(), Some("$disconnect"));

        table.insert("ws", RouteKey::disconnect(), id("Ws")).unwrap();
        assert_eq!(table.missing_lifecycle(), None);

        assert_eq!(table.dispatch("make_move"), None);
        table
            .insert("ws", RouteKey::parse("$default").unwrap(), id("Fallback"))
            .unwrap();
        assert_eq!(table.dispatch("make_move"), Some(&id("Fallback")));
        assert_eq!(table.dispatch("$connect"), Some(&id("Ws")));
    }
}
