//! `Role`: per-role defaults and stuck-detection overrides, referenced by a
//! task's `spec.role` (§4.2, §4.11). `Task` itself is generated by the
//! `kube::CustomResource` derive on [`crate::spec::TaskSpec`].

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "hortator.io",
    version = "v1alpha1",
    kind = "Role",
    namespaced,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    /// Capabilities granted to any task that declares this role, unioned
    /// with the task's own declared set before escalation checks (§4.4).
    #[serde(default)]
    pub default_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_tool_diversity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repeated_run: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_minutes: Option<u32>,
    /// Free-form per-role knobs not otherwise modeled, read by name at the
    /// call site rather than plumbed through every struct (§4.2).
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod tests;
