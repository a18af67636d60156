//! The stack builder
//!
//! Declarations are accepted in construction order. Each one is validated
//! locally (property bounds), then against the graph built so far (name
//! uniqueness, references, route conflicts) before it is committed. Nothing
//! is committed by a rejected declaration.

use crate::grants::{grant_actions, GrantSet};
use crate::graph::{
    ComputeTarget, ResourceNode, ResourceSpec, RestApiSpec, RestRouteSpec, WebSocketApiSpec,
    WebSocketRouteSpec,
};
use crate::manifest::StackManifest;
use crate::outputs::{validate_output_name, OutputEntry, OutputRegistry};
use crate::routing::{parse_path, RestRouteTree, WebSocketRouteTable};
use crate::validation;
use arena_types::{
    AccessLevel, Attribute, BucketHandle, BucketProps, DistributionHandle, DistributionProps,
    FunctionHandle, FunctionProps, Grant, HttpMethod, IdentityPoolHandle, IdentityPoolProps,
    LogicalId, PolicyStatement, ResourceHandle, ResourceKind, ResourceRef, RestApiHandle,
    RestApiProps, RestRouteHandle, Result, RouteKey, StackId, StageHandle, StageProps,
    TableHandle, TableProps, TopologyError, UserPoolClientHandle, UserPoolClientProps,
    UserPoolHandle, UserPoolProps, ValueExpr, WebSocketApiHandle, WebSocketApiProps,
    WebSocketRouteHandle,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Action granted by [`Stack::grant_manage_connections`].
pub const MANAGE_CONNECTIONS_ACTION: &str = "execute-api:ManageConnections";

pub const MAX_STACK_NAME_LEN: usize = 128;

/// Builder for one declaration pass
#[derive(Debug)]
pub struct Stack {
    id: StackId,
    name: String,
    nodes: Vec<ResourceNode>,
    by_logical_id: HashMap<LogicalId, usize>,
    /// (kind, physical name) pairs already claimed.
    physical_names: HashSet<(ResourceKind, String)>,
    outputs: OutputRegistry,
    /// First rejected declaration; latched for the rest of the pass.
    failure: Option<TopologyError>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let failure = validate_stack_name(&name).err();
        if let Some(err) = &failure {
            warn!(stack = %name, error = %err, "Invalid stack name");
        }

        Self {
            id: StackId::generate(),
            name,
            nodes: Vec::new(),
            by_logical_id: HashMap::new(),
            physical_names: HashSet::new(),
            outputs: OutputRegistry::new(),
            failure,
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn id(&self) -> StackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared resources in construction order.
    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn node(&self, logical_id: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.logical_id().as_str() == logical_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    /// The error that latched the stack, if any.
    pub fn failure(&self) -> Option<&TopologyError> {
        self.failure.as_ref()
    }

    /// The compute target behind a function handle.
    pub fn function(&self, function: &FunctionHandle) -> Result<&ComputeTarget> {
        let ordinal = self.resolve_handle(function.logical_id(), function.raw())?;
        match &self.nodes[ordinal].spec {
            ResourceSpec::Function(target) => Ok(target),
            _ => Err(dangling_kind(function.raw(), ResourceKind::Function)),
        }
    }

    /// Grants currently held by a function.
    pub fn grants(&self, function: &FunctionHandle) -> Result<&GrantSet> {
        Ok(&self.function(function)?.grants)
    }

    pub fn rest_routes(&self, api: &RestApiHandle) -> Result<&RestRouteTree> {
        let ordinal = self.resolve_handle(api.logical_id(), api.raw())?;
        match &self.nodes[ordinal].spec {
            ResourceSpec::RestApi(spec) => Ok(&spec.routes),
            _ => Err(dangling_kind(api.raw(), ResourceKind::RestApi)),
        }
    }

    pub fn websocket_routes(&self, api: &WebSocketApiHandle) -> Result<&WebSocketRouteTable> {
        let ordinal = self.resolve_handle(api.logical_id(), api.raw())?;
        match &self.nodes[ordinal].spec {
            ResourceSpec::WebSocketApi(spec) => Ok(&spec.routes),
            _ => Err(dangling_kind(api.raw(), ResourceKind::WebSocketApi)),
        }
    }

    /// Function serving a concrete REST request.
    pub fn resolve(
        &self,
        api: &RestApiHandle,
        method: HttpMethod,
        path: &str,
    ) -> Result<Option<FunctionHandle>> {
        let target = self.rest_routes(api)?.resolve(method, path);
        target.map(|id| self.function_handle(id)).transpose()
    }

    /// Function serving an inbound websocket message with the given route key.
    pub fn dispatch(&self, api: &WebSocketApiHandle, route_key: &str) -> Result<Option<FunctionHandle>> {
        let target = self.websocket_routes(api)?.dispatch(route_key);
        target.map(|id| self.function_handle(id)).transpose()
    }

    fn function_handle(&self, id: &LogicalId) -> Result<FunctionHandle> {
        let ordinal = self
            .by_logical_id
            .get(id)
            .copied()
            .ok_or_else(|| TopologyError::dangling(self.name.as_str(), id.as_str()))?;
        FunctionHandle::try_from(self.nodes[ordinal].handle.clone())
    }

    // ── Storage ────────────────────────────────────────────────────────

    pub fn add_table(&mut self, props: TableProps) -> Result<TableHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            stack.check_physical_name(ResourceKind::Table, &props.table_name)?;

            let id = props.logical_id.clone();
            let name = props.table_name.clone();
            stack.commit(id, ResourceSpec::Table(props), BTreeSet::new(), Some(name))
        })
    }

    // ── Identity ───────────────────────────────────────────────────────

    pub fn add_user_pool(&mut self, props: UserPoolProps) -> Result<UserPoolHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            stack.check_physical_name(ResourceKind::UserPool, &props.user_pool_name)?;

            let id = props.logical_id.clone();
            let name = props.user_pool_name.clone();
            stack.commit(id, ResourceSpec::UserPool(props), BTreeSet::new(), Some(name))
        })
    }

    pub fn add_user_pool_client(&mut self, props: UserPoolClientProps) -> Result<UserPoolClientHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            let pool = stack.resolve_handle(&props.logical_id, props.user_pool.raw())?;

            let id = props.logical_id.clone();
            let deps = BTreeSet::from([pool]);
            stack.commit(id, ResourceSpec::UserPoolClient(props), deps, None)
        })
    }

    /// Declare a federated identity bridge over one or more directory clients.
    pub fn add_identity_pool(&mut self, props: IdentityPoolProps) -> Result<IdentityPoolHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            if props.providers.is_empty() {
                return Err(TopologyError::policy(
                    props.logical_id.as_str(),
                    "identity pool requires at least one user pool client",
                ));
            }

            let mut deps = BTreeSet::new();
            for provider in &props.providers {
                let client = stack.resolve_handle(&props.logical_id, provider.client.raw())?;
                let pool = stack.resolve_handle(&props.logical_id, provider.user_pool.raw())?;

                let owner = match &stack.nodes[client].spec {
                    ResourceSpec::UserPoolClient(client) => client.user_pool.logical_id(),
                    _ => return Err(dangling_kind(provider.client.raw(), ResourceKind::UserPoolClient)),
                };
                if owner != provider.user_pool.logical_id() {
                    return Err(TopologyError::policy(
                        props.logical_id.as_str(),
                        format!(
                            "client '{}' belongs to '{owner}', not '{}'",
                            provider.client.logical_id(),
                            provider.user_pool.logical_id()
                        ),
                    ));
                }
                deps.insert(client);
                deps.insert(pool);
            }
            stack.check_physical_name(ResourceKind::IdentityPool, &props.identity_pool_name)?;

            let id = props.logical_id.clone();
            let name = props.identity_pool_name.clone();
            stack.commit(id, ResourceSpec::IdentityPool(props), deps, Some(name))
        })
    }

    // ── Compute ────────────────────────────────────────────────────────

    /// Declare a function. Environment values are resolved against the
    /// resources declared so far.
    pub fn add_function(&mut self, mut props: FunctionProps) -> Result<FunctionHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            if let Some(name) = &props.function_name {
                stack.check_physical_name(ResourceKind::Function, name)?;
            }

            let mut deps = BTreeSet::new();
            let mut environment = Vec::with_capacity(props.environment.len());
            for (key, value) in &props.environment {
                let resolved = stack.resolve_expr(&props.logical_id, value, &mut deps)?;
                environment.push((key.clone(), resolved));
            }
            props.environment = environment;

            let id = props.logical_id.clone();
            let name = props.function_name.clone();
            stack.commit(id, ResourceSpec::Function(ComputeTarget::new(props)), deps, name)
        })
    }

    /// Grant a function an access level on an earlier-declared table, bucket
    /// or user pool. Returns `false` if the identical grant was already held.
    pub fn grant(
        &mut self,
        function: &FunctionHandle,
        resource: impl AsRef<ResourceHandle>,
        level: AccessLevel,
    ) -> Result<bool> {
        let resource = resource.as_ref();
        self.guarded(|stack| {
            let from = function.logical_id();
            let function_ordinal = stack.resolve_handle(from, function.raw())?;
            let resource_ordinal = stack.resolve_handle(from, resource)?;

            if resource_ordinal > function_ordinal {
                return Err(TopologyError::dangling(
                    from.as_str(),
                    format!(
                        "{} (declared after the function; use a role statement instead)",
                        resource.logical_id()
                    ),
                ));
            }
            if grant_actions(resource.kind(), level).is_none() {
                return Err(TopologyError::policy(
                    from.as_str(),
                    format!("a {} does not accept {level} grants", resource.kind()),
                ));
            }

            let grant = Grant::resource(resource.logical_id().clone(), level);
            let node = &mut stack.nodes[function_ordinal];
            let ResourceSpec::Function(target) = &mut node.spec else {
                return Err(dangling_kind(function.raw(), ResourceKind::Function));
            };

            let inserted = target.grants.insert(grant);
            if inserted {
                node.depends_on.insert(resource_ordinal);
                debug!(function = %from, resource = %resource.logical_id(), %level, "Granted access");
            }
            Ok(inserted)
        })
    }

    /// Attach a free-form statement to a function's role.
    ///
    /// Unlike [`Stack::grant`], the statement may name resources declared
    /// after the function, as long as they exist by now.
    pub fn add_to_role_policy(
        &mut self,
        function: &FunctionHandle,
        statement: PolicyStatement,
    ) -> Result<bool> {
        self.guarded(|stack| stack.attach_statement(function, statement))
    }

    /// Allow a function to push messages to connections of a deployed stage.
    pub fn grant_manage_connections(
        &mut self,
        function: &FunctionHandle,
        stage: &StageHandle,
    ) -> Result<bool> {
        self.guarded(|stack| {
            let statement = PolicyStatement::allow(
                [MANAGE_CONNECTIONS_ACTION],
                [ValueExpr::join([stage.arn(), ValueExpr::literal("/*")])],
            );
            stack.attach_statement(function, statement)
        })
    }

    fn attach_statement(&mut self, function: &FunctionHandle, statement: PolicyStatement) -> Result<bool> {
        let from = function.logical_id();
        let function_ordinal = self.resolve_handle(from, function.raw())?;

        if statement.actions.is_empty() || statement.resources.is_empty() {
            return Err(TopologyError::policy(
                from.as_str(),
                "role statements need at least one action and one resource",
            ));
        }
        if let Some(action) = statement.actions.iter().find(|a| !is_service_action(a)) {
            return Err(TopologyError::policy(
                from.as_str(),
                format!("action '{action}' is not of the form 'service:Action'"),
            ));
        }

        let mut policy_deps = BTreeSet::new();
        let mut resources = Vec::with_capacity(statement.resources.len());
        for resource in &statement.resources {
            resources.push(self.resolve_expr(from, resource, &mut policy_deps)?);
        }
        let resolved = PolicyStatement {
            effect: statement.effect,
            actions: statement.actions,
            resources,
        };

        let ResourceSpec::Function(target) = &mut self.nodes[function_ordinal].spec else {
            return Err(dangling_kind(function.raw(), ResourceKind::Function));
        };
        let summary = Grant::Statement(resolved.clone()).to_string();
        let inserted = target.grants.insert(Grant::Statement(resolved));
        if inserted {
            target.policy_depends_on.extend(policy_deps);
            debug!(function = %from, statement = %summary, "Attached role statement");
        }
        Ok(inserted)
    }

    // ── Synchronous API surface ────────────────────────────────────────

    pub fn add_rest_api(&mut self, props: RestApiProps) -> Result<RestApiHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            stack.check_physical_name(ResourceKind::RestApi, &props.rest_api_name)?;

            let id = props.logical_id.clone();
            let name = props.rest_api_name.clone();
            let routes = RestRouteTree::new(props.cors.is_some());
            let spec = ResourceSpec::RestApi(RestApiSpec { props, routes });
            stack.commit(id, spec, BTreeSet::new(), Some(name))
        })
    }

    /// Bind `method` on `path` (e.g. `/stats/{userId}`) to a function.
    pub fn add_rest_route(
        &mut self,
        api: &RestApiHandle,
        path: &str,
        method: HttpMethod,
        function: &FunctionHandle,
    ) -> Result<RestRouteHandle> {
        self.guarded(|stack| {
            let surface = api.logical_id();
            let api_ordinal = stack.resolve_handle(surface, api.raw())?;
            let function_ordinal = stack.resolve_handle(surface, function.raw())?;
            let segments = parse_path(surface.as_str(), path)?;

            let route_id = stack.unique_logical_id(&rest_route_id(surface, &segments, method))?;
            let target = function.logical_id().clone();

            let ResourceSpec::RestApi(spec) = &mut stack.nodes[api_ordinal].spec else {
                return Err(dangling_kind(api.raw(), ResourceKind::RestApi));
            };
            spec.routes
                .insert(surface.as_str(), &segments, method, target.clone())?;

            let route = RestRouteSpec {
                api: surface.clone(),
                path: format!("/{}", segments.join("/")),
                method,
                target,
            };
            let deps = BTreeSet::from([api_ordinal, function_ordinal]);
            stack.commit(route_id, ResourceSpec::RestRoute(route), deps, None)
        })
    }

    // ── Asynchronous API surface ───────────────────────────────────────

    pub fn add_websocket_api(&mut self, props: WebSocketApiProps) -> Result<WebSocketApiHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            stack.check_physical_name(ResourceKind::WebSocketApi, &props.api_name)?;

            let id = props.logical_id.clone();
            let name = props.api_name.clone();
            let spec = ResourceSpec::WebSocketApi(WebSocketApiSpec {
                props,
                routes: WebSocketRouteTable::new(),
                stages: BTreeSet::new(),
            });
            stack.commit(id, spec, BTreeSet::new(), Some(name))
        })
    }

    /// Bind a route key (`$connect`, `join_queue`, ...) to a function.
    pub fn add_websocket_route(
        &mut self,
        api: &WebSocketApiHandle,
        route_key: &str,
        function: &FunctionHandle,
    ) -> Result<WebSocketRouteHandle> {
        self.guarded(|stack| {
            let surface = api.logical_id();
            let api_ordinal = stack.resolve_handle(surface, api.raw())?;
            let function_ordinal = stack.resolve_handle(surface, function.raw())?;
            let key = RouteKey::parse(route_key)?;

            let route_id = stack.unique_logical_id(&websocket_route_id(surface, &key))?;
            let target = function.logical_id().clone();

            let ResourceSpec::WebSocketApi(spec) = &mut stack.nodes[api_ordinal].spec else {
                return Err(dangling_kind(api.raw(), ResourceKind::WebSocketApi));
            };
            spec.routes
                .insert(surface.as_str(), key.clone(), target.clone())?;

            let route = WebSocketRouteSpec {
                api: surface.clone(),
                route_key: key,
                target,
            };
            let deps = BTreeSet::from([api_ordinal, function_ordinal]);
            stack.commit(route_id, ResourceSpec::WebSocketRoute(route), deps, None)
        })
    }

    pub fn add_websocket_stage(&mut self, props: StageProps) -> Result<StageHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            let api_ordinal = stack.resolve_handle(&props.logical_id, props.api.raw())?;

            let ResourceSpec::WebSocketApi(spec) = &mut stack.nodes[api_ordinal].spec else {
                return Err(dangling_kind(props.api.raw(), ResourceKind::WebSocketApi));
            };
            if !spec.stages.insert(props.stage_name.clone()) {
                return Err(TopologyError::duplicate(
                    format!("stage of '{}'", props.api.logical_id()),
                    props.stage_name.as_str(),
                ));
            }

            let id = props.logical_id.clone();
            let deps = BTreeSet::from([api_ordinal]);
            stack.commit(id, ResourceSpec::WebSocketStage(props), deps, None)
        })
    }

    // ── Static asset surface ───────────────────────────────────────────

    pub fn add_bucket(&mut self, props: BucketProps) -> Result<BucketHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            stack.check_physical_name(ResourceKind::Bucket, &props.bucket_name)?;

            let id = props.logical_id.clone();
            let name = props.bucket_name.clone();
            stack.commit(id, ResourceSpec::Bucket(props), BTreeSet::new(), Some(name))
        })
    }

    pub fn add_distribution(&mut self, props: DistributionProps) -> Result<DistributionHandle> {
        self.guarded(|stack| {
            stack.check_logical_id(&props.logical_id)?;
            props.validate()?;
            let origin = stack.resolve_handle(&props.logical_id, props.origin.raw())?;

            let id = props.logical_id.clone();
            let deps = BTreeSet::from([origin]);
            stack.commit(id, ResourceSpec::Distribution(props), deps, None)
        })
    }

    // ── Outputs ────────────────────────────────────────────────────────

    /// Publish a named value. Re-using a name overwrites the earlier entry.
    pub fn add_output(
        &mut self,
        name: &str,
        value: impl Into<ValueExpr>,
        description: impl Into<String>,
    ) -> Result<()> {
        let value = value.into();
        let description = description.into();
        self.guarded(|stack| {
            validate_output_name(name)?;
            let from = LogicalId::new(name)?;
            let value = stack.resolve_expr(&from, &value, &mut BTreeSet::new())?;

            let entry = OutputEntry {
                name: name.to_string(),
                value,
                description,
            };
            match stack.outputs.record(entry) {
                Some(previous) => warn!(output = name, previous = %previous.value, "Output overwritten"),
                None => debug!(output = name, "Declared output"),
            }
            Ok(())
        })
    }

    // ── Synthesis ──────────────────────────────────────────────────────

    /// Validate the finished graph and render the manifest.
    pub fn synth(&self) -> Result<StackManifest> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        validation::validate_graph(&self.nodes, &self.outputs)?;

        let manifest = StackManifest::build(self);
        info!(
            stack = %self.name,
            resources = manifest.resources.len(),
            outputs = manifest.outputs.len(),
            "Synthesized stack"
        );
        Ok(manifest)
    }

    // ── Internals ──────────────────────────────────────────────────────

    /// Run a declaration, latching its error.
    fn guarded<T>(&mut self, declare: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        match declare(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(stack = %self.name, error = %err, "Declaration rejected");
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    fn check_logical_id(&self, id: &LogicalId) -> Result<()> {
        if self.by_logical_id.contains_key(id) {
            return Err(TopologyError::duplicate("logical id", id.as_str()));
        }
        Ok(())
    }

    fn check_physical_name(&self, kind: ResourceKind, name: &str) -> Result<()> {
        if self.physical_names.contains(&(kind, name.to_string())) {
            return Err(TopologyError::duplicate(kind.to_string(), name));
        }
        Ok(())
    }

    /// Derive a logical id from `base`, appending a counter on collision.
    fn unique_logical_id(&self, base: &str) -> Result<LogicalId> {
        let mut candidate = LogicalId::new(base)?;
        let mut suffix = 2;
        while self.by_logical_id.contains_key(&candidate) {
            candidate = LogicalId::new(format!("{base}{suffix}"))?;
            suffix += 1;
        }
        Ok(candidate)
    }

    /// Check that a handle was minted by this stack and is still the node
    /// it claims to be.
    fn resolve_handle(&self, from: &LogicalId, handle: &ResourceHandle) -> Result<usize> {
        let dangling = || TopologyError::dangling(from.as_str(), handle.logical_id().as_str());
        if handle.stack() != self.id {
            return Err(dangling());
        }
        match self.nodes.get(handle.ordinal()) {
            Some(node) if node.handle == *handle => Ok(handle.ordinal()),
            _ => Err(dangling()),
        }
    }

    fn resolve_ref(&self, from: &LogicalId, reference: &ResourceRef) -> Result<usize> {
        match reference {
            ResourceRef::Handle(handle) => self.resolve_handle(from, handle),
            ResourceRef::Named(id) => self
                .by_logical_id
                .get(id)
                .copied()
                .ok_or_else(|| TopologyError::dangling(from.as_str(), id.as_str())),
        }
    }

    /// Resolve every reference in `expr` to a logical id, recording the
    /// referenced ordinals in `deps`.
    fn resolve_expr(
        &self,
        from: &LogicalId,
        expr: &ValueExpr,
        deps: &mut BTreeSet<usize>,
    ) -> Result<ValueExpr> {
        expr.try_map_refs(&mut |reference: &ResourceRef, attribute: Attribute| {
            let ordinal = self.resolve_ref(from, reference)?;
            let node = &self.nodes[ordinal];
            if !attribute.is_exposed_by(node.kind()) {
                return Err(TopologyError::dangling(
                    from.as_str(),
                    format!("{}.{attribute} (a {} has no {attribute})", node.logical_id(), node.kind()),
                ));
            }
            deps.insert(ordinal);
            Ok(ResourceRef::named(node.logical_id()))
        })
    }

    fn commit<H>(
        &mut self,
        logical_id: LogicalId,
        spec: ResourceSpec,
        depends_on: BTreeSet<usize>,
        physical_name: Option<String>,
    ) -> Result<H>
    where
        H: TryFrom<ResourceHandle, Error = TopologyError>,
    {
        let ordinal = self.nodes.len();
        let kind = spec.kind();
        let handle = ResourceHandle::new(self.id, ordinal, logical_id.clone(), kind);
        let typed = H::try_from(handle.clone())?;

        if let Some(name) = physical_name {
            self.physical_names.insert((kind, name));
        }
        self.by_logical_id.insert(logical_id.clone(), ordinal);
        self.nodes.push(ResourceNode {
            handle,
            spec,
            depends_on,
        });

        debug!(stack = %self.name, %logical_id, %kind, ordinal, "Declared resource");
        Ok(typed)
    }
}

fn validate_stack_name(name: &str) -> Result<()> {
    let valid = name.len() <= MAX_STACK_NAME_LEN
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid {
        return Err(TopologyError::policy(
            format!("stack '{name}'"),
            format!(
                "stack names must start with a letter and contain at most {MAX_STACK_NAME_LEN} letters, digits or '-'"
            ),
        ));
    }
    Ok(())
}

fn dangling_kind(handle: &ResourceHandle, expected: ResourceKind) -> TopologyError {
    TopologyError::dangling(
        handle.logical_id().as_str(),
        format!("a {expected} (found {})", handle.kind()),
    )
}

fn is_service_action(action: &str) -> bool {
    match action.split_once(':') {
        Some((service, name)) => {
            !service.is_empty()
                && !name.is_empty()
                && service.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }
        None => false,
    }
}

fn pascal_case(value: &str) -> String {
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `RpsRestApi` + `/stats/{userId}` + GET -> `RpsRestApiStatsUserIdGet`
fn rest_route_id(api: &LogicalId, segments: &[String], method: HttpMethod) -> String {
    let path = if segments.is_empty() {
        "Root".to_string()
    } else {
        segments.iter().map(|s| pascal_case(s)).collect()
    };
    format!("{api}{path}{}", pascal_case(&method.as_str().to_ascii_lowercase()))
}

/// `RpsWebSocketApi` + `join_queue` -> `RpsWebSocketApiJoinQueueRoute`
fn websocket_route_id(api: &LogicalId, key: &RouteKey) -> String {
    format!("{api}{}Route", pascal_case(key.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_types::{CodeRef, CorsPolicy, KeyAttribute};
    use std::time::Duration;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn users_table() -> TableProps {
        TableProps::new(id("RpsUsersTable"), "rps-users", KeyAttribute::string("userId"))
    }

    fn function(name: &str) -> FunctionProps {
        FunctionProps::new(id(name), CodeRef::Asset(format!("../src/handlers/{name}")))
            .with_timeout(Duration::from_secs(30))
    }

    #[test]
    fn route_ids_are_pascal_cased() {
        let segments = vec!["stats".to_string(), "{userId}".to_string()];
        assert_eq!(
            rest_route_id(&id("RpsRestApi"), &segments, HttpMethod::Get),
            "RpsRestApiStatsUserIdGet"
        );
        assert_eq!(
            rest_route_id(&id("RpsRestApi"), &[], HttpMethod::Any),
            "RpsRestApiRootAny"
        );
        assert_eq!(
            websocket_route_id(&id("RpsWebSocketApi"), &RouteKey::connect()),
            "RpsWebSocketApiConnectRoute"
        );
    }

    #[test]
    fn service_actions_need_a_colon() {
        assert!(is_service_action("execute-api:ManageConnections"));
        assert!(is_service_action("dynamodb:*"));
        assert!(!is_service_action("ManageConnections"));
        assert!(!is_service_action(":Get"));
    }

    #[test]
    fn invalid_stack_name_latches_immediately() {
        let mut stack = Stack::new("rps battle arena");
        assert!(stack.failure().is_some());
        assert!(stack.add_table(users_table()).is_err());
        assert!(stack.is_empty());
    }

    #[test]
    fn handles_carry_construction_order() {
        let mut stack = Stack::new("RpsBattleArena");
        let users = stack.add_table(users_table()).unwrap();
        let auth = stack
            .add_function(function("Auth").with_env("USERS_TABLE", users.table_name()))
            .unwrap();

        assert_eq!(users.raw().ordinal(), 0);
        assert_eq!(auth.raw().ordinal(), 1);
        assert_eq!(stack.nodes()[1].depends_on, BTreeSet::from([0]));
    }

    #[test]
    fn duplicate_logical_id_is_rejected() {
        let mut stack = Stack::new("RpsBattleArena");
        stack.add_table(users_table()).unwrap();

        let again = TableProps::new(id("RpsUsersTable"), "rps-users-2", KeyAttribute::string("userId"));
        let err = stack.add_table(again).unwrap_err();
        assert_eq!(err, TopologyError::duplicate("logical id", "RpsUsersTable"));
    }

    #[test]
    fn physical_names_are_scoped_by_kind() {
        let mut stack = Stack::new("RpsBattleArena");
        stack.add_table(users_table()).unwrap();
        let pool = UserPoolProps::new(id("RpsUserPool"), "rps-users");
        assert!(stack.add_user_pool(pool).is_ok());
    }

    #[test]
    fn named_references_resolve() {
        let mut stack = Stack::new("RpsBattleArena");
        stack.add_table(users_table()).unwrap();
        let named = ValueExpr::attr(id("RpsUsersTable"), Attribute::Name);
        let game = stack
            .add_function(function("Game").with_env("USERS_TABLE", named))
            .unwrap();

        let env = stack.function(&game).unwrap().environment();
        assert_eq!(env, vec![("USERS_TABLE", "${RpsUsersTable.Name}".to_string())]);
    }

    #[test]
    fn unknown_named_reference_dangles() {
        let mut stack = Stack::new("RpsBattleArena");
        let missing = ValueExpr::attr(id("RpsGamesTable"), Attribute::Name);
        let err = stack
            .add_function(function("Game").with_env("GAMES_TABLE", missing))
            .unwrap_err();
        assert!(matches!(err, TopologyError::DanglingReference { .. }));
    }

    #[test]
    fn unexposed_attribute_dangles() {
        let mut stack = Stack::new("RpsBattleArena");
        let users = stack.add_table(users_table()).unwrap();
        let err = stack
            .add_function(function("Game").with_env("USERS_URL", users.attr(Attribute::Url)))
            .unwrap_err();
        assert!(err.to_string().contains("RpsUsersTable.Url"));
    }

    #[test]
    fn foreign_handles_dangle() {
        let mut other = Stack::new("OtherStack");
        let foreign = other.add_table(users_table()).unwrap();

        let mut stack = Stack::new("RpsBattleArena");
        stack.add_table(users_table()).unwrap();
        let err = stack
            .add_function(function("Game").with_env("USERS_TABLE", foreign.table_name()))
            .unwrap_err();
        assert!(matches!(err, TopologyError::DanglingReference { .. }));
    }

    #[test]
    fn first_error_is_latched() {
        let mut stack = Stack::new("RpsBattleArena");
        stack.add_table(users_table()).unwrap();
        let first = stack.add_table(users_table()).unwrap_err();

        let bucket = BucketProps::website(id("RpsWebsiteBucket"), "rps-battle-arena-frontend");
        assert_eq!(stack.add_bucket(bucket).unwrap_err(), first);
        assert_eq!(stack.synth().unwrap_err(), first);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn grant_rejects_later_resources_and_functions() {
        let mut stack = Stack::new("RpsBattleArena");
        let auth = stack.add_function(function("Auth")).unwrap();
        let game = stack.add_function(function("Game")).unwrap();

        let err = stack.grant(&auth, &game, AccessLevel::Read).unwrap_err();
        assert!(matches!(err, TopologyError::DanglingReference { .. }));
    }

    #[test]
    fn grant_on_function_is_a_policy_violation() {
        let mut stack = Stack::new("RpsBattleArena");
        let auth = stack.add_function(function("Auth")).unwrap();
        let game = stack.add_function(function("Game")).unwrap();

        let err = stack.grant(&game, &auth, AccessLevel::Read).unwrap_err();
        assert!(matches!(err, TopologyError::PolicyViolation { .. }));
    }

    #[test]
    fn role_statements_validate_actions() {
        let mut stack = Stack::new("RpsBattleArena");
        let users = stack.add_table(users_table()).unwrap();
        let auth = stack.add_function(function("Auth")).unwrap();

        let statement = PolicyStatement::allow(["PutItem"], [users.table_arn()]);
        let err = stack.add_to_role_policy(&auth, statement).unwrap_err();
        assert!(matches!(err, TopologyError::PolicyViolation { .. }));
    }

    #[test]
    fn rest_route_failure_commits_nothing() {
        let mut stack = Stack::new("RpsBattleArena");
        let game = stack.add_function(function("Game")).unwrap();
        let api = stack
            .add_rest_api(
                RestApiProps::new(id("RpsRestApi"), "rps-battle-arena-api")
                    .with_cors(CorsPolicy::default()),
            )
            .unwrap();

        let err = stack
            .add_rest_route(&api, "/leaderboard", HttpMethod::Options, &game)
            .unwrap_err();
        assert!(matches!(err, TopologyError::RouteConflict { .. }));
        assert_eq!(stack.len(), 2);
        assert!(stack.rest_routes(&api).unwrap().is_empty());
    }

    #[test]
    fn stage_names_are_unique_per_api() {
        let mut stack = Stack::new("RpsBattleArena");
        let api = stack
            .add_websocket_api(WebSocketApiProps::new(id("RpsWebSocketApi"), "rps-websocket-api"))
            .unwrap();
        stack
            .add_websocket_stage(StageProps::new(id("RpsWebSocketStage"), "prod", &api))
            .unwrap();

        let err = stack
            .add_websocket_stage(StageProps::new(id("RpsWebSocketStage2"), "prod", &api))
            .unwrap_err();
        assert!(matches!(err, TopologyError::DuplicateName { .. }));
    }

    #[test]
    fn identity_pool_providers_must_match() {
        let mut stack = Stack::new("RpsBattleArena");
        let pool_a = stack
            .add_user_pool(UserPoolProps::new(id("RpsUserPool"), "rps-user-pool"))
            .unwrap();
        let pool_b = stack
            .add_user_pool(UserPoolProps::new(id("RpsAdminPool"), "rps-admin-pool"))
            .unwrap();
        let client = stack
            .add_user_pool_client(UserPoolClientProps::new(id("RpsUserPoolClient"), &pool_a))
            .unwrap();

        let empty = IdentityPoolProps::new(id("RpsIdentityPool"), "rps_identity_pool");
        let mut scratch = Stack::new("RpsScratchStack");
        assert!(scratch.add_identity_pool(empty).is_err());

        let mismatched = IdentityPoolProps::new(id("RpsIdentityPool"), "rps_identity_pool")
            .with_provider(&client, &pool_b);
        let err = stack.add_identity_pool(mismatched).unwrap_err();
        assert!(err.to_string().contains("belongs to 'RpsUserPool'"));
    }

    #[test]
    fn outputs_overwrite_in_place() {
        let mut stack = Stack::new("RpsBattleArena");
        let users = stack.add_table(users_table()).unwrap();
        stack.add_output("UsersTable", users.table_name(), "").unwrap();
        stack.add_output("Region", "eu-west-1", "").unwrap();
        stack.add_output("UsersTable", users.table_arn(), "Users table").unwrap();

        let outputs: Vec<_> = stack.outputs().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(outputs, vec!["UsersTable", "Region"]);
        assert_eq!(
            stack.outputs().get("UsersTable").unwrap().value.to_string(),
            "${RpsUsersTable.Arn}"
        );
    }
}
