//! Output registry
//!
//! Flat symbolic name -> value table handed back by the provisioning engine
//! once every referenced resource exists.

use arena_types::{Result, TopologyError, ValueExpr};
use serde::Serialize;

pub const MAX_OUTPUT_NAME_LEN: usize = 255;

/// One named output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputEntry {
    pub name: String,
    pub value: ValueExpr,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Check that an output name is usable as a symbolic key.
pub fn validate_output_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_OUTPUT_NAME_LEN {
        return Err(TopologyError::policy(
            format!("output '{name}'"),
            format!("output names must be 1-{MAX_OUTPUT_NAME_LEN} characters"),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(TopologyError::policy(
            format!("output '{name}'"),
            "output names may only contain ASCII letters and digits",
        ));
    }
    Ok(())
}

/// Outputs in first-declaration order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct OutputRegistry {
    entries: Vec<OutputEntry>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry, overwriting an existing one of the same name in
    /// place. Returns the replaced entry.
    pub fn record(&mut self, entry: OutputEntry) -> Option<OutputEntry> {
        match self.entries.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => Some(std::mem::replace(existing, entry)),
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&OutputEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
