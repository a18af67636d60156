//! The RPS Battle Arena topology
//!
//! Three tables, a user directory, three functions, a REST surface for
//! sign-in and statistics, a WebSocket surface for matchmaking and moves,
//! and an optional static website behind an edge distribution.

use crate::config::StackConfig;
use crate::error::StackResult;
use crate::stack::Stack;
use arena_types::{
    AccessLevel, AuthFlows, BucketHandle, BucketProps, CodeRef, DistributionHandle,
    DistributionProps, EntryPoint, FunctionHandle, FunctionProps, HttpMethod, IdentityPoolHandle,
    IdentityPoolProps, KeyAttribute, LogicalId, RestApiHandle, RestApiProps, RouteKey,
    StageHandle, StageProps, TableHandle, TableProps, UserPoolClientHandle, UserPoolClientProps,
    UserPoolHandle, UserPoolProps, ValueExpr, ViewerProtocolPolicy, WebSocketApiHandle,
    WebSocketApiProps,
};
use std::time::Duration;
use tracing::info;

/// Application route keys of the WebSocket surface.
pub const GAME_ROUTE_KEYS: [&str; 2] = ["join_queue", "make_move"];

/// Website bucket and the distribution in front of it
#[derive(Debug, Clone)]
pub struct Website {
    pub bucket: BucketHandle,
    pub distribution: DistributionHandle,
}

/// The declared game topology with handles to its main resources
#[derive(Debug)]
pub struct ArenaStack {
    pub stack: Stack,
    pub users_table: TableHandle,
    pub games_table: TableHandle,
    pub connections_table: TableHandle,
    pub user_pool: UserPoolHandle,
    pub user_pool_client: UserPoolClientHandle,
    pub identity_pool: Option<IdentityPoolHandle>,
    pub auth_function: FunctionHandle,
    pub game_function: FunctionHandle,
    pub websocket_function: FunctionHandle,
    pub rest_api: RestApiHandle,
    pub websocket_api: WebSocketApiHandle,
    pub websocket_stage: StageHandle,
    pub website: Option<Website>,
}

/// Declare the full game topology described by `config`.
pub fn declare_arena_stack(config: &StackConfig) -> StackResult<ArenaStack> {
    let naming = &config.naming;
    let id = |suffix: &str| LogicalId::new(naming.logical(suffix));
    let mut stack = Stack::new(naming.stack_name.as_str());

    // ── Storage ──────────────────────────────────────────────────────

    let users_table = stack.add_table(TableProps::new(
        id("UsersTable")?,
        naming.physical("users"),
        KeyAttribute::string("userId"),
    ))?;

    let games_table = stack.add_table(
        TableProps::new(
            id("GamesTable")?,
            naming.physical("games"),
            KeyAttribute::string("gameId"),
        )
        .with_sort_key(KeyAttribute::string("timestamp")),
    )?;

    let connections_table = stack.add_table(
        TableProps::new(
            id("ConnectionsTable")?,
            naming.physical("connections"),
            KeyAttribute::string("connectionId"),
        )
        .with_time_to_live("ttl"),
    )?;

    // ── Identity ─────────────────────────────────────────────────────

    let identity = &config.identity;
    let mut pool_props = UserPoolProps::new(id("UserPool")?, naming.physical("user-pool"));
    pool_props.self_sign_up = identity.self_sign_up;
    pool_props.sign_in_aliases = identity.sign_in_aliases;
    pool_props.password_policy = identity.password_policy;
    if identity.sign_in_aliases.email {
        pool_props.auto_verify.push("email".into());
    }
    let user_pool = stack.add_user_pool(pool_props)?;

    let mut client_props = UserPoolClientProps::new(id("UserPoolClient")?, &user_pool);
    client_props.generate_secret = false;
    client_props.auth_flows = AuthFlows {
        user_password: true,
        user_srp: true,
        ..Default::default()
    };
    let user_pool_client = stack.add_user_pool_client(client_props)?;

    let identity_pool = if identity.identity_bridge {
        let mut bridge = IdentityPoolProps::new(
            id("IdentityPool")?,
            format!("{}_identity_pool", naming.resource_prefix.replace('-', "_")),
        )
        .with_provider(&user_pool_client, &user_pool);
        bridge.allow_unauthenticated = identity.allow_unauthenticated;
        Some(stack.add_identity_pool(bridge)?)
    } else {
        None
    };

    // ── Compute ──────────────────────────────────────────────────────

    let compute = &config.compute;
    let function = |suffix: &str, handler_dir: &str| -> StackResult<FunctionProps> {
        Ok(FunctionProps::new(id(suffix)?, CodeRef::Asset(compute.asset(handler_dir)))
            .with_entry_point(EntryPoint::new(compute.runtime, compute.handler.as_str()))
            .with_timeout(Duration::from_secs(compute.timeout_secs)))
    };

    let auth_function = stack.add_function(
        function("AuthFunction", "auth")?
            .with_env("USERS_TABLE", users_table.table_name())
            .with_env("USER_POOL_ID", user_pool.user_pool_id())
            .with_env("USER_POOL_CLIENT_ID", user_pool_client.client_id()),
    )?;

    let game_function = stack.add_function(
        function("GameFunction", "game")?
            .with_env("USERS_TABLE", users_table.table_name())
            .with_env("GAMES_TABLE", games_table.table_name()),
    )?;

    let websocket_function = stack.add_function(
        function("WebSocketFunction", "websocket")?
            .with_env("CONNECTIONS_TABLE", connections_table.table_name())
            .with_env("GAMES_TABLE", games_table.table_name())
            .with_env("USERS_TABLE", users_table.table_name()),
    )?;

    stack.grant(&auth_function, &users_table, AccessLevel::ReadWrite)?;
    stack.grant(&game_function, &users_table, AccessLevel::ReadWrite)?;
    stack.grant(&game_function, &games_table, AccessLevel::ReadWrite)?;
    stack.grant(&websocket_function, &connections_table, AccessLevel::ReadWrite)?;
    stack.grant(&websocket_function, &games_table, AccessLevel::ReadWrite)?;
    stack.grant(&websocket_function, &users_table, AccessLevel::ReadWrite)?;

    // ── REST surface ─────────────────────────────────────────────────

    let mut rest_props = RestApiProps::new(id("RestApi")?, naming.project_scoped("api"))
        .with_description("REST API for RPS Battle Arena");
    rest_props.cors = config.api.cors_policy();
    let rest_api = stack.add_rest_api(rest_props)?;

    stack.add_rest_route(&rest_api, "/auth", HttpMethod::Post, &auth_function)?;
    stack.add_rest_route(&rest_api, "/stats/{userId}", HttpMethod::Get, &game_function)?;
    stack.add_rest_route(&rest_api, "/leaderboard", HttpMethod::Get, &game_function)?;

    // ── WebSocket surface ────────────────────────────────────────────

    let websocket_api = stack.add_websocket_api(
        WebSocketApiProps::new(id("WebSocketApi")?, naming.physical("websocket-api"))
            .with_description("WebSocket API for RPS Battle Arena real-time communication"),
    )?;

    let mut stage_props = StageProps::new(
        id("WebSocketStage")?,
        config.api.websocket_stage.as_str(),
        &websocket_api,
    );
    stage_props.auto_deploy = config.api.auto_deploy;
    let websocket_stage = stack.add_websocket_stage(stage_props)?;

    for key in RouteKey::LIFECYCLE.into_iter().chain(GAME_ROUTE_KEYS) {
        stack.add_websocket_route(&websocket_api, key, &websocket_function)?;
    }

    // Pushing game updates back to connected players needs the stage.
    stack.grant_manage_connections(&websocket_function, &websocket_stage)?;

    // ── Static site ──────────────────────────────────────────────────

    let website = if config.static_site.enabled {
        let site = &config.static_site;
        let bucket_name = site
            .bucket_name
            .clone()
            .unwrap_or_else(|| naming.project_scoped("frontend"));
        let mut bucket_props = BucketProps::website(id("WebsiteBucket")?, bucket_name);
        bucket_props.index_document = site.index_document.clone();
        bucket_props.error_document = site.error_document.clone();
        let bucket = stack.add_bucket(bucket_props)?;

        let mut distribution_props = DistributionProps::new(id("Distribution")?, &bucket);
        distribution_props.viewer_protocol_policy = ViewerProtocolPolicy::RedirectToHttps;
        distribution_props.default_root_object = site.index_document.clone();
        let distribution = stack.add_distribution(distribution_props)?;

        Some(Website {
            bucket,
            distribution,
        })
    } else {
        None
    };

    // ── Outputs ──────────────────────────────────────────────────────

    stack.add_output("RestApiUrl", rest_api.url(), "REST API URL")?;
    stack.add_output("WebSocketApiUrl", websocket_stage.url(), "WebSocket API URL")?;
    if let Some(website) = &website {
        let url = ValueExpr::join([
            ValueExpr::literal("https://"),
            website.distribution.domain_name(),
        ]);
        stack.add_output("WebsiteUrl", url, "Website URL")?;
    }
    stack.add_output("UserPoolId", user_pool.user_pool_id(), "Cognito User Pool ID")?;
    stack.add_output(
        "UserPoolClientId",
        user_pool_client.client_id(),
        "Cognito User Pool Client ID",
    )?;
    if let Some(identity_pool) = &identity_pool {
        stack.add_output(
            "IdentityPoolId",
            identity_pool.identity_pool_id(),
            "Cognito Identity Pool ID",
        )?;
    }

    info!(
        stack = %stack.name(),
        resources = stack.len(),
        "Declared arena topology"
    );

    Ok(ArenaStack {
        stack,
        users_table,
        games_table,
        connections_table,
        user_pool,
        user_pool_client,
        identity_pool,
        auth_function,
        game_function,
        websocket_function,
        rest_api,
        websocket_api,
        websocket_stage,
        website,
    })
}
