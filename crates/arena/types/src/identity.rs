//! Identity directory, client registrations, and the federated identity bridge
//!
//! Three tiers: the user pool owns credentials, a client is an application's
//! registration against exactly one pool, and the identity pool exchanges a
//! pool credential for a federated access token.

use crate::error::{Result, TopologyError};
use crate::handle::{UserPoolClientHandle, UserPoolHandle};
use crate::ids::LogicalId;
use crate::policy::RemovalPolicy;
use serde::{Deserialize, Serialize};

/// Platform floor for the minimum password length.
pub const MIN_PASSWORD_LENGTH: u8 = 6;

/// Platform ceiling for the minimum password length.
pub const MAX_PASSWORD_LENGTH: u8 = 99;

/// Identifiers a user may sign in with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInAliases {
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub username: bool,
    #[serde(default)]
    pub phone: bool,
}

impl SignInAliases {
    pub fn any(&self) -> bool {
        self.email || self.username || self.phone
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: u8,
    #[serde(default)]
    pub require_lowercase: bool,
    #[serde(default)]
    pub require_uppercase: bool,
    #[serde(default)]
    pub require_digits: bool,
    #[serde(default)]
    pub require_symbols: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_lowercase: true,
            require_uppercase: true,
            require_digits: true,
            require_symbols: false,
        }
    }
}

impl PasswordPolicy {
    pub fn validate(&self, resource: &str) -> Result<()> {
        if self.min_length < MIN_PASSWORD_LENGTH {
            return Err(TopologyError::policy(
                resource,
                format!(
                    "password minimum length {} is below the platform floor of {MIN_PASSWORD_LENGTH}",
                    self.min_length
                ),
            ));
        }
        if self.min_length > MAX_PASSWORD_LENGTH {
            return Err(TopologyError::policy(
                resource,
                format!(
                    "password minimum length {} exceeds {MAX_PASSWORD_LENGTH}",
                    self.min_length
                ),
            ));
        }
        Ok(())
    }
}

/// Declaration of a user directory
#[derive(Debug, Clone, Serialize)]
pub struct UserPoolProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub user_pool_name: String,
    pub self_sign_up: bool,
    pub sign_in_aliases: SignInAliases,
    pub password_policy: PasswordPolicy,
    /// Attributes verified automatically on sign-up (e.g. `email`).
    pub auto_verify: Vec<String>,
    pub removal_policy: RemovalPolicy,
}

impl UserPoolProps {
    pub fn new(logical_id: LogicalId, user_pool_name: impl Into<String>) -> Self {
        Self {
            logical_id,
            user_pool_name: user_pool_name.into(),
            self_sign_up: false,
            sign_in_aliases: SignInAliases {
                username: true,
                ..Default::default()
            },
            password_policy: PasswordPolicy::default(),
            auto_verify: Vec::new(),
            removal_policy: RemovalPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let resource = self.logical_id.as_str();
        if self.user_pool_name.trim().is_empty() {
            return Err(TopologyError::policy(resource, "user pool name is empty"));
        }
        if self.user_pool_name.len() > 128 {
            return Err(TopologyError::policy(
                resource,
                "user pool name exceeds 128 characters",
            ));
        }
        if !self.sign_in_aliases.any() {
            return Err(TopologyError::policy(
                resource,
                "at least one sign-in alias is required",
            ));
        }
        self.password_policy.validate(resource)?;

        for attribute in &self.auto_verify {
            if !matches!(attribute.as_str(), "email" | "phone_number") {
                return Err(TopologyError::policy(
                    resource,
                    format!("attribute '{attribute}' cannot be auto-verified"),
                ));
            }
        }

        Ok(())
    }
}

/// Authentication flows a client may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFlows {
    #[serde(default)]
    pub user_password: bool,
    #[serde(default)]
    pub user_srp: bool,
    #[serde(default)]
    pub admin_user_password: bool,
    #[serde(default)]
    pub custom: bool,
}

impl AuthFlows {
    pub fn any(&self) -> bool {
        self.user_password || self.user_srp || self.admin_user_password || self.custom
    }
}

/// Declaration of an application registration against a user pool
#[derive(Debug, Clone, Serialize)]
pub struct UserPoolClientProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub client_name: Option<String>,
    pub user_pool: UserPoolHandle,
    pub generate_secret: bool,
    pub auth_flows: AuthFlows,
}

impl UserPoolClientProps {
    pub fn new(logical_id: LogicalId, user_pool: &UserPoolHandle) -> Self {
        Self {
            logical_id,
            client_name: None,
            user_pool: user_pool.clone(),
            generate_secret: false,
            auth_flows: AuthFlows {
                user_srp: true,
                ..Default::default()
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.auth_flows.any() {
            return Err(TopologyError::policy(
                self.logical_id.as_str(),
                "at least one auth flow must be enabled",
            ));
        }
        Ok(())
    }
}

/// A (client, directory) pair trusted by an identity pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityProvider {
    pub client: UserPoolClientHandle,
    pub user_pool: UserPoolHandle,
}

/// Declaration of a federated identity bridge
#[derive(Debug, Clone, Serialize)]
pub struct IdentityPoolProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub identity_pool_name: String,
    pub providers: Vec<IdentityProvider>,
    pub allow_unauthenticated: bool,
    pub removal_policy: RemovalPolicy,
}

impl IdentityPoolProps {
    pub fn new(logical_id: LogicalId, identity_pool_name: impl Into<String>) -> Self {
        Self {
            logical_id,
            identity_pool_name: identity_pool_name.into(),
            providers: Vec::new(),
            allow_unauthenticated: false,
            removal_policy: RemovalPolicy::default(),
        }
    }

    pub fn with_provider(mut self, client: &UserPoolClientHandle, user_pool: &UserPoolHandle) -> Self {
        self.providers.push(IdentityProvider {
            client: client.clone(),
            user_pool: user_pool.clone(),
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        let resource = self.logical_id.as_str();
        if self.identity_pool_name.trim().is_empty() {
            return Err(TopologyError::policy(resource, "identity pool name is empty"));
        }
        if !self
            .identity_pool_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' '))
        {
            return Err(TopologyError::policy(
                resource,
                format!(
                    "identity pool name '{}' may only contain letters, digits, spaces and underscores",
                    self.identity_pool_name
                ),
            ));
        }
        Ok(())
    }
}
