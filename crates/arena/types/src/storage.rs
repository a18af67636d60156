//! Keyed table declarations

use crate::error::{Result, TopologyError};
use crate::ids::LogicalId;
use crate::policy::RemovalPolicy;
use serde::{Deserialize, Serialize};

pub const MIN_TABLE_NAME_LEN: usize = 3;
pub const MAX_TABLE_NAME_LEN: usize = 255;

/// Scalar type of a key attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    #[default]
    String,
    Number,
    Binary,
}

/// A key attribute of a table's key schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    #[serde(rename = "type", default)]
    pub attribute_type: AttributeType,
}

impl KeyAttribute {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::String,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::Number,
        }
    }
}

/// Throughput mode
///
/// Only on-demand capacity is accepted; provisioned throughput is rejected so
/// there is never capacity to manage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityMode {
    #[default]
    OnDemand,
    Provisioned { read_units: u32, write_units: u32 },
}

/// Declaration of a durable keyed table
#[derive(Debug, Clone, Serialize)]
pub struct TableProps {
    #[serde(skip)]
    pub logical_id: LogicalId,
    pub table_name: String,
    pub partition_key: KeyAttribute,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<KeyAttribute>,
    /// Records whose value in this attribute lies in the past expire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live_attribute: Option<String>,
    pub capacity: CapacityMode,
    pub removal_policy: RemovalPolicy,
}

impl TableProps {
    pub fn new(
        logical_id: LogicalId,
        table_name: impl Into<String>,
        partition_key: KeyAttribute,
    ) -> Self {
        Self {
            logical_id,
            table_name: table_name.into(),
            partition_key,
            sort_key: None,
            time_to_live_attribute: None,
            capacity: CapacityMode::OnDemand,
            removal_policy: RemovalPolicy::default(),
        }
    }

    pub fn with_sort_key(mut self, sort_key: KeyAttribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    pub fn with_time_to_live(mut self, attribute: impl Into<String>) -> Self {
        self.time_to_live_attribute = Some(attribute.into());
        self
    }

    pub fn with_capacity(mut self, capacity: CapacityMode) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_removal_policy(mut self, removal_policy: RemovalPolicy) -> Self {
        self.removal_policy = removal_policy;
        self
    }

    /// Check platform bounds that need no view of the rest of the graph.
    pub fn validate(&self) -> Result<()> {
        let resource = self.logical_id.as_str();

        let len = self.table_name.len();
        if !(MIN_TABLE_NAME_LEN..=MAX_TABLE_NAME_LEN).contains(&len) {
            return Err(TopologyError::policy(
                resource,
                format!(
                    "table name '{}' must be {MIN_TABLE_NAME_LEN}-{MAX_TABLE_NAME_LEN} characters",
                    self.table_name
                ),
            ));
        }
        if !self
            .table_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(TopologyError::policy(
                resource,
                format!("table name '{}' contains invalid characters", self.table_name),
            ));
        }

        if self.partition_key.name.is_empty() {
            return Err(TopologyError::policy(resource, "partition key name is empty"));
        }
        if let Some(sort_key) = &self.sort_key {
            if sort_key.name.is_empty() {
                return Err(TopologyError::policy(resource, "sort key name is empty"));
            }
            if sort_key.name == self.partition_key.name {
                return Err(TopologyError::policy(
                    resource,
                    "sort key must differ from the partition key",
                ));
            }
        }

        if let Some(ttl) = &self.time_to_live_attribute {
            let is_key = ttl == &self.partition_key.name
                || self.sort_key.as_ref().is_some_and(|k| &k.name == ttl);
            if ttl.is_empty() || is_key {
                return Err(TopologyError::policy(
                    resource,
                    format!("time-to-live attribute '{ttl}' must be a non-key attribute"),
                ));
            }
        }

        if let CapacityMode::Provisioned { .. } = self.capacity {
            return Err(TopologyError::policy(
                resource,
                "capacity mode is fixed to on-demand",
            ));
        }

        Ok(())
    }
}
