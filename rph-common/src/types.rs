//! Common types used across RPH components.
//!
//! [`Resource`] is the untyped manifest handed over by the restore host.
//! [`PodVolumeRestore`] models just enough of the volume-restore record to
//! correlate it with a Pod and move its phase, while carrying every other
//! field through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Kind discriminator for Pods.
pub const POD_KIND: &str = "Pod";

/// An arbitrary cluster object: a JSON mapping with string keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource(Map<String, Value>);

impl Resource {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build a resource from any JSON value. Returns `None` unless the
    /// value is an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    /// The `kind` field, or an empty string.
    pub fn kind(&self) -> &str {
        self.0.get("kind").and_then(Value::as_str).unwrap_or("")
    }

    pub fn is_pod(&self) -> bool {
        self.kind() == POD_KIND
    }

    fn metadata(&self) -> Option<&Map<String, Value>> {
        self.0.get("metadata").and_then(Value::as_object)
    }

    /// `metadata.name`, or an empty string.
    pub fn name(&self) -> &str {
        self.metadata()
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// `metadata.namespace`, or an empty string.
    pub fn namespace(&self) -> &str {
        self.metadata()
            .and_then(|m| m.get("namespace"))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// `metadata.labels`, `None` when the mapping is absent.
    ///
    /// Non-string label values are skipped.
    pub fn labels(&self) -> Option<BTreeMap<String, String>> {
        let labels = self.metadata()?.get("labels")?.as_object()?;
        Some(
            labels
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect(),
        )
    }

    /// Overwrite `metadata.name`. Returns `false` when `metadata` is
    /// missing or not a mapping.
    pub fn set_name(&mut self, name: &str) -> bool {
        match self.0.get_mut("metadata").and_then(Value::as_object_mut) {
            Some(metadata) => {
                metadata.insert("name".to_string(), Value::String(name.to_string()));
                true
            }
            None => false,
        }
    }

    /// Short `Kind namespace/name` form for log lines.
    pub fn describe(&self) -> String {
        match self.namespace() {
            "" => format!("{} {}", self.kind(), self.name()),
            ns => format!("{} {}/{}", self.kind(), ns, self.name()),
        }
    }
}

/// Phase of a volume-restore record.
///
/// Values not known to this build are carried verbatim in [`Other`].
///
/// [`Other`]: VolumeRestorePhase::Other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VolumeRestorePhase {
    /// Created but not yet picked up (pending).
    New,
    InProgress,
    Completed,
    Failed,
    Canceled,
    Other(String),
}

impl VolumeRestorePhase {
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "New",
            Self::InProgress => "InProgress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for VolumeRestorePhase {
    fn from(value: String) -> Self {
        match value.as_str() {
            "New" => Self::New,
            "InProgress" => Self::InProgress,
            "Completed" => Self::Completed,
            "Failed" => Self::Failed,
            "Canceled" => Self::Canceled,
            _ => Self::Other(value),
        }
    }
}

impl From<VolumeRestorePhase> for String {
    fn from(value: VolumeRestorePhase) -> Self {
        value.as_str().to_string()
    }
}

impl std::str::FromStr for VolumeRestorePhase {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

impl std::fmt::Display for VolumeRestorePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object metadata as far as the hook needs it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Optimistic-concurrency token; sent back unchanged on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to the Pod whose volume is being restored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodReference {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodVolumeRestoreSpec {
    #[serde(default)]
    pub pod: PodReference,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodVolumeRestoreStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<VolumeRestorePhase>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A volume-restore record (`podvolumerestores.velero.io`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodVolumeRestore {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodVolumeRestoreSpec,
    #[serde(default)]
    pub status: PodVolumeRestoreStatus,
}

impl PodVolumeRestore {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Name of the Pod this record restores a volume for.
    pub fn pod_name(&self) -> &str {
        &self.spec.pod.name
    }

    pub fn phase(&self) -> Option<&VolumeRestorePhase> {
        self.status.phase.as_ref()
    }
}

/// A list response (`{"items": [...]}`) from the cluster API.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// A ConfigMap, reduced to its metadata and string data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigMap {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}
