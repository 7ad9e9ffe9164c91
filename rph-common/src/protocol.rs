//! Host protocol definitions.
//!
//! The host hands one resource per invocation on stdin and reads the
//! (possibly rewritten) resource back from stdout.

use crate::types::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input received from the host for one resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteInput {
    /// The resource about to be restored.
    pub item: Resource,
    /// The resource exactly as stored in the backup.
    #[serde(default)]
    pub item_from_backup: Option<Value>,
    /// The restore this resource belongs to.
    #[serde(default)]
    pub restore: Option<Value>,
}

/// Output sent back to the host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOutput {
    pub updated_item: Resource,
    /// Always empty; the hook never adds resources.
    pub additional_items: Vec<Value>,
    pub skip_restore: bool,
}

impl ExecuteOutput {
    /// Restore `item` and nothing else.
    pub fn updated(item: Resource) -> Self {
        Self {
            updated_item: item,
            additional_items: Vec::new(),
            skip_restore: false,
        }
    }
}

/// Which resources the host should route through the hook.
///
/// Empty lists and an empty label selector mean "everything".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    pub included_namespaces: Vec<String>,
    pub excluded_namespaces: Vec<String>,
    pub included_resources: Vec<String>,
    pub excluded_resources: Vec<String>,
    pub label_selector: String,
}

impl ResourceSelector {
    /// A selector matching every resource.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches_all(&self) -> bool {
        self == &Self::default()
    }
}
