//! Synchronous (REST) and asynchronous (WebSocket) API surface declarations

use crate::error::{Result, TopologyError};
use crate::handle::WebSocketApiHandle;
use crate::ids::LogicalId;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── REST ───────────────────────────────────────────────────────────────

/// HTTP method of a REST route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    /// Catch-all binding for every method on the path.
    Any,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "ANY",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-origin policy applied uniformly to every route of a surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorsPolicy {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<HttpMethod>,
    pub allow_headers: Vec<String>,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allow_origins: vec!["*".into()],
            allow_methods: vec![
                HttpMethod::Get,
                HttpMethod::Post,
                HttpMethod::Put,
                HttpMethod::Delete,
                HttpMethod::Options,
            ],
            allow_headers: vec!["Content-Type".into(), "Authorization".into()],
        }
    }
}

impl CorsPolicy {
    pub fn validate(&self, resource: &str) -> Result<()> {
        if self.allow_origins.is_empty() {
            return Err(TopologyError::policy(
                resource,
                "cors policy must allow at least one origin",
            ));
        }
        if self.allow_methods.is_empty() {
            return Err(TopologyError::policy(
                resource,
                "cors policy must allow at least one method",
            ));
        }
        if self.allow_origins.len() > 1 && self.allow_origins.iter().any(|o| o == "*") {
            return Err(TopologyError::policy(
                resource,
                "wildcard origin cannot be combined with explicit origins",
            ));
        }
        Ok(())
    }
}

/// Declaration of a REST surface
#[derive(Debug, Clone, Serialize)]
pub struct RestApiProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub rest_api_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Installs a preflight `OPTIONS` method on every path node when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors: Option<CorsPolicy>,
}

impl RestApiProps {
    pub fn new(logical_id: LogicalId, rest_api_name: impl Into<String>) -> Self {
        Self {
            logical_id,
            rest_api_name: rest_api_name.into(),
            description: None,
            cors: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_cors(mut self, cors: CorsPolicy) -> Self {
        self.cors = Some(cors);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let resource = self.logical_id.as_str();
        if self.rest_api_name.trim().is_empty() {
            return Err(TopologyError::policy(resource, "rest api name is empty"));
        }
        if let Some(cors) = &self.cors {
            cors.validate(resource)?;
        }
        Ok(())
    }
}

// ── WebSocket ──────────────────────────────────────────────────────────

/// Route key of an asynchronous surface
///
/// `$connect`, `$disconnect` and `$default` are reserved lifecycle keys; every
/// other key is an application-defined discriminator carried in the message
/// envelope and may not start with `$`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RouteKey(String);

impl RouteKey {
    pub const CONNECT: &'static str = "$connect";
    pub const DISCONNECT: &'static str = "$disconnect";
    pub const DEFAULT: &'static str = "$default";

    /// Keys that must be bound on every websocket api.
    pub const LIFECYCLE: [&'static str; 2] = [Self::CONNECT, Self::DISCONNECT];

    pub fn parse(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(TopologyError::policy("<route key>", "route key is empty"));
        }
        if key.starts_with('$') && !Self::is_reserved(&key) {
            return Err(TopologyError::policy(
                key.clone(),
                "route keys starting with '$' are reserved",
            ));
        }
        if key.len() > 128 {
            return Err(TopologyError::policy(key, "route key exceeds 128 characters"));
        }
        Ok(Self(key))
    }

    pub fn connect() -> Self {
        Self(Self::CONNECT.into())
    }

    pub fn disconnect() -> Self {
        Self(Self::DISCONNECT.into())
    }

    pub fn is_reserved(key: &str) -> bool {
        matches!(key, Self::CONNECT | Self::DISCONNECT | Self::DEFAULT)
    }

    pub fn is_lifecycle(&self) -> bool {
        Self::is_reserved(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declaration of a WebSocket surface
#[derive(Debug, Clone, Serialize)]
pub struct WebSocketApiProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub api_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Where the dispatcher finds the route key in an inbound message.
    pub route_selection_expression: String,
}

impl WebSocketApiProps {
    pub fn new(logical_id: LogicalId, api_name: impl Into<String>) -> Self {
        Self {
            logical_id,
            api_name: api_name.into(),
            description: None,
            route_selection_expression: "$request.body.action".into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let resource = self.logical_id.as_str();
        if self.api_name.trim().is_empty() {
            return Err(TopologyError::policy(resource, "websocket api name is empty"));
        }
        if !self.route_selection_expression.starts_with("$request.") {
            return Err(TopologyError::policy(
                resource,
                format!(
                    "route selection expression '{}' must select from $request",
                    self.route_selection_expression
                ),
            ));
        }
        Ok(())
    }
}

/// Declaration of a deployed stage of a WebSocket surface
#[derive(Debug, Clone, Serialize)]
pub struct StageProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub stage_name: String,
    pub api: WebSocketApiHandle,
    pub auto_deploy: bool,
}

impl StageProps {
    pub fn new(logical_id: LogicalId, stage_name: impl Into<String>, api: &WebSocketApiHandle) -> Self {
        Self {
            logical_id,
            stage_name: stage_name.into(),
            api: api.clone(),
            auto_deploy: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let valid = !self.stage_name.is_empty()
            && self.stage_name.len() <= 128
            && self
                .stage_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'));
        if !valid {
            return Err(TopologyError::policy(
                self.logical_id.as_str(),
                format!("stage name '{}' is invalid", self.stage_name),
            ));
        }
        Ok(())
    }
}
