//! Configuration for the arena topology

use crate::error::{StackError, StackResult};
use arena_types::{CorsPolicy, PasswordPolicy, Runtime, SignInAliases};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "ARENA_STACK_CONFIG";

/// Main stack configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfig {
    /// Stack and resource naming
    #[serde(default)]
    pub naming: NamingConfig,

    /// Function packaging and runtime
    #[serde(default)]
    pub compute: ComputeConfig,

    /// REST and WebSocket surfaces
    #[serde(default)]
    pub api: ApiConfig,

    /// User directory and identity bridge
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Website bucket and distribution
    #[serde(default)]
    pub static_site: StaticSiteConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Manifest rendering
    #[serde(default)]
    pub manifest: ManifestConfig,
}

/// Naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Stack name
    #[serde(default = "default_stack_name")]
    pub stack_name: String,

    /// Prefix of physical resource names (`rps` -> `rps-users`)
    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,

    /// Project segment of API and bucket names (`rps-battle-arena-api`)
    #[serde(default = "default_project")]
    pub project: String,

    /// Prefix of logical ids (`Rps` -> `RpsUsersTable`)
    #[serde(default = "default_logical_prefix")]
    pub logical_prefix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            stack_name: default_stack_name(),
            resource_prefix: default_resource_prefix(),
            project: default_project(),
            logical_prefix: default_logical_prefix(),
        }
    }
}

impl NamingConfig {
    /// `<prefix>-<suffix>`
    pub fn physical(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.resource_prefix)
    }

    /// `<prefix>-<project>-<suffix>`
    pub fn project_scoped(&self, suffix: &str) -> String {
        format!("{}-{}-{suffix}", self.resource_prefix, self.project)
    }

    /// `<Prefix><Suffix>`
    pub fn logical(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.logical_prefix)
    }
}

/// Compute configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeConfig {
    /// Directory holding one sub-directory per handler
    #[serde(default = "default_asset_root")]
    pub asset_root: String,

    #[serde(default)]
    pub runtime: Runtime,

    #[serde(default = "default_handler")]
    pub handler: String,

    /// Function timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            runtime: Runtime::default(),
            handler: default_handler(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ComputeConfig {
    /// Asset path of one handler directory.
    pub fn asset(&self, handler_dir: &str) -> String {
        format!("{}/{handler_dir}", self.asset_root.trim_end_matches('/'))
    }
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable CORS (and the preflight route) on the REST surface
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    #[serde(default)]
    pub cors: CorsPolicy,

    /// Name of the WebSocket stage
    #[serde(default = "default_stage")]
    pub websocket_stage: String,

    #[serde(default = "default_true")]
    pub auto_deploy: bool,
}

impl ApiConfig {
    pub fn cors_policy(&self) -> Option<CorsPolicy> {
        self.enable_cors.then(|| self.cors.clone())
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            cors: CorsPolicy::default(),
            websocket_stage: default_stage(),
            auto_deploy: true,
        }
    }
}

/// Identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_true")]
    pub self_sign_up: bool,

    #[serde(default = "default_sign_in_aliases")]
    pub sign_in_aliases: SignInAliases,

    #[serde(default)]
    pub password_policy: PasswordPolicy,

    /// Declare a federated identity bridge over the client
    #[serde(default)]
    pub identity_bridge: bool,

    #[serde(default)]
    pub allow_unauthenticated: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            self_sign_up: true,
            sign_in_aliases: default_sign_in_aliases(),
            password_policy: PasswordPolicy::default(),
            identity_bridge: false,
            allow_unauthenticated: false,
        }
    }
}

/// Static site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSiteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bucket name; defaults to `<prefix>-<project>-frontend`
    #[serde(default)]
    pub bucket_name: Option<String>,

    #[serde(default = "default_index_document")]
    pub index_document: String,

    #[serde(default = "default_error_document")]
    pub error_document: String,
}

impl Default for StaticSiteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket_name: None,
            index_document: default_index_document(),
            error_document: default_error_document(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Manifest output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    #[default]
    Json,
    Yaml,
}

/// Manifest configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub format: ManifestFormat,

    /// Write to this file instead of stdout
    #[serde(default)]
    pub output: Option<PathBuf>,
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_stack_name() -> String {
    "RpsBattleArena".to_string()
}

fn default_resource_prefix() -> String {
    "rps".to_string()
}

fn default_project() -> String {
    "battle-arena".to_string()
}

fn default_logical_prefix() -> String {
    "Rps".to_string()
}

fn default_asset_root() -> String {
    "../src/handlers".to_string()
}

fn default_handler() -> String {
    "index.handler".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_stage() -> String {
    "prod".to_string()
}

fn default_sign_in_aliases() -> SignInAliases {
    SignInAliases {
        email: true,
        username: true,
        phone: false,
    }
}

fn default_index_document() -> String {
    "index.html".to_string()
}

fn default_error_document() -> String {
    "error.html".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl StackConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// no path is given or the file does not exist.
    pub fn load(path: Option<&Path>) -> StackResult<Self> {
        match path {
            Some(path) if path.exists() => {
                let contents = std::fs::read_to_string(path)?;
                debug!(path = %path.display(), "Loaded stack configuration");
                Self::from_toml_str(&contents)
            }
            Some(path) => {
                debug!(path = %path.display(), "Configuration file not found, using defaults");
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> StackResult<Self> {
        let config: StackConfig = toml::from_str(contents)?;
        config.check()?;
        Ok(config)
    }

    /// Checks that serde cannot express.
    fn check(&self) -> StackResult<()> {
        if self.naming.resource_prefix.is_empty() {
            return Err(StackError::Config("naming.resource_prefix is empty".into()));
        }
        if self.compute.timeout_secs == 0 {
            return Err(StackError::Config("compute.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}
