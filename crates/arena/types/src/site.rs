//! Static asset origin and edge distribution

use crate::error::{Result, TopologyError};
use crate::handle::BucketHandle;
use crate::ids::LogicalId;
use crate::policy::RemovalPolicy;
use serde::{Deserialize, Serialize};

pub const MIN_BUCKET_NAME_LEN: usize = 3;
pub const MAX_BUCKET_NAME_LEN: usize = 63;

/// Declaration of a content bucket serving the client application
#[derive(Debug, Clone, Serialize)]
pub struct BucketProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub bucket_name: String,
    pub index_document: String,
    pub error_document: String,
    pub public_read: bool,
    /// Empty the bucket before deleting it on teardown.
    pub auto_delete_objects: bool,
    pub removal_policy: RemovalPolicy,
}

impl BucketProps {
    pub fn website(logical_id: LogicalId, bucket_name: impl Into<String>) -> Self {
        Self {
            logical_id,
            bucket_name: bucket_name.into(),
            index_document: "index.html".into(),
            error_document: "error.html".into(),
            public_read: true,
            auto_delete_objects: true,
            removal_policy: RemovalPolicy::Destroy,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let resource = self.logical_id.as_str();
        let name = &self.bucket_name;

        if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&name.len()) {
            return Err(TopologyError::policy(
                resource,
                format!(
                    "bucket name '{name}' must be {MIN_BUCKET_NAME_LEN}-{MAX_BUCKET_NAME_LEN} characters"
                ),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.'))
        {
            return Err(TopologyError::policy(
                resource,
                format!("bucket name '{name}' may only contain lowercase letters, digits, '-' and '.'"),
            ));
        }
        let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
            return Err(TopologyError::policy(
                resource,
                format!("bucket name '{name}' must begin and end with a letter or digit"),
            ));
        }

        if self.index_document.is_empty() || self.error_document.is_empty() {
            return Err(TopologyError::policy(
                resource,
                "index and error documents are required",
            ));
        }
        if self.auto_delete_objects && self.removal_policy == RemovalPolicy::Retain {
            return Err(TopologyError::policy(
                resource,
                "auto-deleting objects requires the destroy removal policy",
            ));
        }

        Ok(())
    }
}

/// How the edge treats plain HTTP viewers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    AllowAll,
    #[default]
    RedirectToHttps,
    HttpsOnly,
}

/// Declaration of the edge-caching front door
#[derive(Debug, Clone, Serialize)]
pub struct DistributionProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub origin: BucketHandle,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub default_root_object: String,
}

impl DistributionProps {
    pub fn new(logical_id: LogicalId, origin: &BucketHandle) -> Self {
        Self {
            logical_id,
            origin: origin.clone(),
            viewer_protocol_policy: ViewerProtocolPolicy::default(),
            default_root_object: "index.html".into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_root_object.starts_with('/') {
            return Err(TopologyError::policy(
                self.logical_id.as_str(),
                "default root object must not start with '/'",
            ));
        }
        Ok(())
    }
}
