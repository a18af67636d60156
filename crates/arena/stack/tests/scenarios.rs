//! End-to-end declaration scenarios.

use arena_stack::types::{
    AccessLevel, Attribute, CodeRef, CorsPolicy, FunctionProps, Grant, HttpMethod, KeyAttribute,
    LogicalId, PolicyStatement, ResourceKind, RestApiProps, StageProps, TableProps, TopologyError,
    UserPoolClientProps, UserPoolProps, ValueExpr, WebSocketApiProps,
};
use arena_stack::{declare_arena_stack, ManifestFormat, Stack, StackConfig, StackError};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn id(s: &str) -> LogicalId {
    LogicalId::new(s).unwrap()
}

fn function(name: &str, handler_dir: &str) -> FunctionProps {
    FunctionProps::new(id(name), CodeRef::Asset(format!("../src/handlers/{handler_dir}")))
        .with_timeout(Duration::from_secs(30))
}

// ---------------------------------------------------------------------------
// REST surface
// ---------------------------------------------------------------------------

#[test]
fn rest_surface_with_three_routes() {
    let mut stack = Stack::new("RpsBattleArena");
    let users = stack
        .add_table(TableProps::new(id("RpsUsersTable"), "rps-users", KeyAttribute::string("userId")))
        .unwrap();
    let games = stack
        .add_table(
            TableProps::new(id("RpsGamesTable"), "rps-games", KeyAttribute::string("gameId"))
                .with_sort_key(KeyAttribute::string("timestamp")),
        )
        .unwrap();
    let game = stack
        .add_function(
            function("RpsGameFunction", "game")
                .with_env("USERS_TABLE", users.table_name())
                .with_env("GAMES_TABLE", games.table_name()),
        )
        .unwrap();
    let auth = stack
        .add_function(function("RpsAuthFunction", "auth").with_env("USERS_TABLE", users.table_name()))
        .unwrap();

    let api = stack
        .add_rest_api(
            RestApiProps::new(id("RpsRestApi"), "rps-battle-arena-api")
                .with_cors(CorsPolicy::default()),
        )
        .unwrap();
    stack.add_rest_route(&api, "/auth", HttpMethod::Post, &auth).unwrap();
    stack
        .add_rest_route(&api, "/stats/{userId}", HttpMethod::Get, &game)
        .unwrap();
    stack
        .add_rest_route(&api, "/leaderboard", HttpMethod::Get, &game)
        .unwrap();

    let routes = stack.rest_routes(&api).unwrap();
    assert_eq!(routes.len(), 3);
    assert_eq!(
        stack.resolve(&api, HttpMethod::Get, "/stats/u-1").unwrap(),
        Some(game.clone())
    );
    assert_eq!(
        stack.resolve(&api, HttpMethod::Post, "/auth").unwrap(),
        Some(auth.clone())
    );
    assert_eq!(stack.resolve(&api, HttpMethod::Get, "/auth").unwrap(), None);

    let env = stack.function(&game).unwrap().environment();
    assert_eq!(
        env,
        vec![
            ("USERS_TABLE", "${RpsUsersTable.Name}".to_string()),
            ("GAMES_TABLE", "${RpsGamesTable.Name}".to_string()),
        ]
    );

    let manifest = stack.synth().unwrap();
    assert_eq!(manifest.resources_of(ResourceKind::RestRoute).count(), 3);
    let route = manifest.resource("RpsRestApiStatsUserIdGet").unwrap();
    assert_eq!(route.depends_on, vec![id("RpsGameFunction"), id("RpsRestApi")]);
}

#[test]
fn duplicate_route_is_rejected_and_latched() {
    let mut stack = Stack::new("RpsBattleArena");
    let game = stack.add_function(function("RpsGameFunction", "game")).unwrap();
    let api = stack
        .add_rest_api(RestApiProps::new(id("RpsRestApi"), "rps-battle-arena-api"))
        .unwrap();

    stack
        .add_rest_route(&api, "/leaderboard", HttpMethod::Get, &game)
        .unwrap();
    let err = stack
        .add_rest_route(&api, "/leaderboard", HttpMethod::Get, &game)
        .unwrap_err();

    assert!(matches!(err, TopologyError::RouteConflict { .. }));
    assert_eq!(stack.synth().unwrap_err(), err);
}

// ---------------------------------------------------------------------------
// WebSocket surface and two-phase grants
// ---------------------------------------------------------------------------

#[test]
fn manage_connections_needs_the_stage() {
    let mut stack = Stack::new("RpsBattleArena");
    let connections = stack
        .add_table(
            TableProps::new(
                id("RpsConnectionsTable"),
                "rps-connections",
                KeyAttribute::string("connectionId"),
            )
            .with_time_to_live("ttl"),
        )
        .unwrap();
    let ws = stack
        .add_function(
            function("RpsWebSocketFunction", "websocket")
                .with_env("CONNECTIONS_TABLE", connections.table_name()),
        )
        .unwrap();
    stack
        .grant(&ws, &connections, AccessLevel::ReadWrite)
        .unwrap();
    let api = stack
        .add_websocket_api(WebSocketApiProps::new(id("RpsWebSocketApi"), "rps-websocket-api"))
        .unwrap();
    for key in ["$connect", "$disconnect", "join_queue", "make_move"] {
        stack.add_websocket_route(&api, key, &ws).unwrap();
    }

    // The stage does not exist yet: a named reference to it dangles.
    let mut early = Stack::new("RpsEarlyStack");
    let early_ws = early.add_function(function("RpsWebSocketFunction", "websocket")).unwrap();
    let premature = PolicyStatement::allow(
        ["execute-api:ManageConnections"],
        [ValueExpr::join([
            ValueExpr::attr(id("RpsWebSocketStage"), Attribute::Arn),
            ValueExpr::literal("/*"),
        ])],
    );
    let err = early.add_to_role_policy(&early_ws, premature).unwrap_err();
    assert!(matches!(err, TopologyError::DanglingReference { .. }));

    let before = stack.grants(&ws).unwrap().len();
    let stage = stack
        .add_websocket_stage(StageProps::new(id("RpsWebSocketStage"), "prod", &api))
        .unwrap();
    assert!(stack.grant_manage_connections(&ws, &stage).unwrap());
    assert_eq!(stack.grants(&ws).unwrap().len(), before + 1);

    // Granting it again changes nothing.
    assert!(!stack.grant_manage_connections(&ws, &stage).unwrap());
    assert_eq!(stack.grants(&ws).unwrap().len(), before + 1);

    let statement = stack
        .grants(&ws)
        .unwrap()
        .iter()
        .find_map(|g| match g {
            Grant::Statement(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(statement.resources[0].to_string(), "${RpsWebSocketStage.Arn}/*");

    let manifest = stack.synth().unwrap();
    let function = manifest.resource("RpsWebSocketFunction").unwrap();
    assert_eq!(function.policy_depends_on, vec![id("RpsWebSocketStage")]);
    assert!(!function.depends_on.contains(&id("RpsWebSocketStage")));
    assert_eq!(function.role_policy.len(), 2);

    assert_eq!(
        stack.dispatch(&api, "make_move").unwrap(),
        Some(ws.clone())
    );
    assert_eq!(stack.dispatch(&api, "chat").unwrap(), None);
}

#[test]
fn staged_websocket_targets_need_connection_grant() {
    let mut stack = Stack::new("RpsBattleArena");
    let ws = stack
        .add_function(function("RpsWebSocketFunction", "websocket"))
        .unwrap();
    let api = stack
        .add_websocket_api(WebSocketApiProps::new(id("RpsWebSocketApi"), "rps-websocket-api"))
        .unwrap();
    for key in ["$connect", "$disconnect", "join_queue", "make_move"] {
        stack.add_websocket_route(&api, key, &ws).unwrap();
    }

    // Without a stage nothing is deployed, so nothing needs the grant.
    assert!(stack.synth().is_ok());

    let stage = stack
        .add_websocket_stage(StageProps::new(id("RpsWebSocketStage"), "prod", &api))
        .unwrap();
    let missing = TopologyError::MissingConnectionGrant {
        function: "RpsWebSocketFunction".into(),
        stage: "RpsWebSocketStage".into(),
    };
    assert_eq!(stack.synth().unwrap_err(), missing);

    // A deny on the stage does not count.
    let deny = PolicyStatement::deny(
        ["execute-api:ManageConnections"],
        [ValueExpr::join([stage.arn(), ValueExpr::literal("/*")])],
    );
    assert!(stack.add_to_role_policy(&ws, deny).unwrap());
    assert_eq!(stack.synth().unwrap_err(), missing);

    // Finalization errors are not latched: granting fixes the stack.
    assert!(stack.failure().is_none());
    assert!(stack.grant_manage_connections(&ws, &stage).unwrap());
    let manifest = stack.synth().unwrap();
    assert_eq!(
        manifest.resource("RpsWebSocketFunction").unwrap().role_policy.len(),
        2
    );
}

#[test]
fn missing_disconnect_fails_at_synthesis() {
    let mut stack = Stack::new("RpsBattleArena");
    let ws = stack
        .add_function(function("RpsWebSocketFunction", "websocket"))
        .unwrap();
    let api = stack
        .add_websocket_api(WebSocketApiProps::new(id("RpsWebSocketApi"), "rps-websocket-api"))
        .unwrap();
    stack.add_websocket_route(&api, "$connect", &ws).unwrap();
    stack.add_websocket_route(&api, "join_queue", &ws).unwrap();

    let err = stack.synth().unwrap_err();
    assert_eq!(
        err,
        TopologyError::MissingLifecycleRoute {
            surface: "RpsWebSocketApi".into(),
            route_key: "$disconnect".into(),
        }
    );
}

#[test]
fn reserved_prefix_route_keys_are_rejected() {
    let mut stack = Stack::new("RpsBattleArena");
    let ws = stack
        .add_function(function("RpsWebSocketFunction", "websocket"))
        .unwrap();
    let api = stack
        .add_websocket_api(WebSocketApiProps::new(id("RpsWebSocketApi"), "rps-websocket-api"))
        .unwrap();

    let err = stack.add_websocket_route(&api, "$ping", &ws).unwrap_err();
    assert!(matches!(err, TopologyError::PolicyViolation { .. }));
}

// ---------------------------------------------------------------------------
// Storage and outputs
// ---------------------------------------------------------------------------

#[test]
fn duplicate_table_name_never_reaches_outputs() {
    let mut stack = Stack::new("RpsBattleArena");
    let users = stack
        .add_table(TableProps::new(id("RpsUsersTable"), "rps-users", KeyAttribute::string("userId")))
        .unwrap();

    let err = stack
        .add_table(TableProps::new(id("RpsUsersTableCopy"), "rps-users", KeyAttribute::string("userId")))
        .unwrap_err();
    assert_eq!(err, TopologyError::duplicate("table", "rps-users"));

    assert!(stack.add_output("UsersTable", users.table_name(), "").is_err());
    assert!(stack.outputs().is_empty());
    assert!(stack.synth().is_err());
}

#[test]
fn outputs_must_resolve() {
    let mut stack = Stack::new("RpsBattleArena");
    let err = stack
        .add_output(
            "WebsiteUrl",
            ValueExpr::join([
                ValueExpr::literal("https://"),
                ValueExpr::attr(id("RpsDistribution"), Attribute::DomainName),
            ]),
            "Website URL",
        )
        .unwrap_err();
    assert!(matches!(err, TopologyError::DanglingReference { .. }));
}

#[test]
fn user_pool_client_requires_a_live_pool() {
    let mut other = Stack::new("OtherStack");
    let foreign_pool = other
        .add_user_pool(UserPoolProps::new(id("RpsUserPool"), "rps-user-pool"))
        .unwrap();

    let mut stack = Stack::new("RpsBattleArena");
    let err = stack
        .add_user_pool_client(UserPoolClientProps::new(id("RpsUserPoolClient"), &foreign_pool))
        .unwrap_err();
    assert!(matches!(err, TopologyError::DanglingReference { .. }));
}

// ---------------------------------------------------------------------------
// Full topology
// ---------------------------------------------------------------------------

#[test]
fn arena_topology_synthesizes() {
    let arena = declare_arena_stack(&StackConfig::default()).unwrap();
    let manifest = arena.stack.synth().unwrap();

    assert_eq!(manifest.resources_of(ResourceKind::Table).count(), 3);
    assert_eq!(manifest.resources_of(ResourceKind::Function).count(), 3);
    assert_eq!(manifest.resources_of(ResourceKind::RestRoute).count(), 3);
    assert_eq!(manifest.resources_of(ResourceKind::WebSocketRoute).count(), 4);

    let website = manifest.output("WebsiteUrl").unwrap();
    assert_eq!(website.value.to_string(), "https://${RpsDistribution.DomainName}");
    assert_eq!(
        manifest.output("WebSocketApiUrl").unwrap().value.to_string(),
        "${RpsWebSocketStage.Url}"
    );

    let auth = manifest.resource("RpsAuthFunction").unwrap();
    assert_eq!(
        auth.depends_on,
        vec![id("RpsUsersTable"), id("RpsUserPool"), id("RpsUserPoolClient")]
    );

    let json: serde_json::Value =
        serde_json::from_str(&manifest.render(ManifestFormat::Json).unwrap()).unwrap();
    assert_eq!(json["stack_name"], "RpsBattleArena");
    let properties = &json["resources"][0]["properties"];
    assert_eq!(properties["table_name"], "rps-users");
    assert_eq!(properties["partition_key"]["name"], "userId");
}

#[test]
fn arena_topology_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.toml");
    std::fs::write(
        &path,
        r#"
[naming]
stack_name = "ArenaStaging"
resource_prefix = "arena-staging"

[api]
enable_cors = false
websocket_stage = "staging"

[identity]
identity_bridge = true

[static_site]
bucket_name = "arena-staging-site"
"#,
    )
    .unwrap();

    let config = StackConfig::load(Some(&path)).unwrap();
    let arena = declare_arena_stack(&config).unwrap();
    let manifest = arena.stack.synth().unwrap();

    assert_eq!(manifest.stack_name, "ArenaStaging");
    assert!(manifest.output("IdentityPoolId").is_some());

    let json: serde_json::Value = serde_json::from_str(&manifest.to_json_pretty().unwrap()).unwrap();
    let names: Vec<&str> = json["resources"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["properties"]["table_name"].as_str())
        .collect();
    assert_eq!(
        names,
        vec!["arena-staging-users", "arena-staging-games", "arena-staging-connections"]
    );

    // Without CORS an explicit OPTIONS route is allowed.
    let mut stack = arena.stack;
    assert!(stack
        .add_rest_route(&arena.rest_api, "/auth", HttpMethod::Options, &arena.auth_function)
        .is_ok());
}

#[test]
fn invalid_config_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.toml");
    std::fs::write(&path, "[naming\nstack_name = 1").unwrap();

    let err = StackConfig::load(Some(&path)).unwrap_err();
    assert!(matches!(err, StackError::Config(_)));
}
