//! The Terraform/OpenTofu state document schema

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A decoded state document
///
/// Writes never pass through this type: stored bytes are accepted
/// verbatim, and are validated against this schema only when read back.
/// A blob that was accepted on write can therefore fail to decode later;
/// that surfaces as a decode error on the read path, not a storage error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// State file format version
    pub version: u64,
    /// Tool version that generated the state
    pub terraform_version: String,
    /// Incrementing number for state revisions
    pub serial: u64,
    /// Unique identifier for this state lineage
    pub lineage: String,
    /// Output values
    #[serde(default)]
    pub outputs: HashMap<String, serde_json::Value>,
    /// Managed resources
    #[serde(default)]
    pub resources: Vec<serde_json::Value>,
    /// Results of checks, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_results: Option<Vec<serde_json::Value>>,
}
