//! Volume-restore phase advancement for restored Pods.
//!
//! After a Pod has been rewritten, the records of the same restore that
//! reference it by name are moved to the target phase so the host's own
//! completion tracking does not stall on them. This is best effort: the
//! host reconciles the records eventually without it.

use crate::config::CorrelationConfig;
use crate::store::{StoreError, VolumeRestoreStore};
use crate::types::Resource;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Reasons the advancement could not complete. None of these fail the hook.
#[derive(Debug, Error)]
pub enum AdvanceError {
    #[error("Pod {pod} has no metadata.name")]
    MissingName { pod: String },

    #[error("Pod {pod} has no metadata.labels")]
    MissingLabels { pod: String },

    #[error("Pod {pod} has no value for correlation label {label}")]
    MissingCorrelation { pod: String, label: String },

    #[error("failed to list volume restores for {selector}: {source}")]
    List {
        selector: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to update status of volume restore {record}: {source}")]
    Update {
        record: String,
        #[source]
        source: StoreError,
    },
}

/// What one successful advancement touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceSummary {
    pub restore_name: String,
    pub restore_uid: String,
    /// Records returned by the label query.
    pub listed: usize,
    /// Names of the records whose phase was written.
    pub advanced: Vec<String>,
}

/// Correlates a Pod with its volume-restore records and advances them.
pub struct StatusAdvancer {
    store: Arc<dyn VolumeRestoreStore>,
    correlation: CorrelationConfig,
}

impl StatusAdvancer {
    pub fn new(store: Arc<dyn VolumeRestoreStore>, correlation: CorrelationConfig) -> Self {
        Self { store, correlation }
    }

    /// Label selector matching the records of one restore.
    pub fn selector(&self, restore_name: &str, restore_uid: &str) -> String {
        format!(
            "{}={},{}={}",
            self.correlation.restore_name_label,
            restore_name,
            self.correlation.restore_uid_label,
            restore_uid
        )
    }

    /// Advance every record of this Pod's restore that references the Pod.
    ///
    /// The prior phase is not inspected; re-running writes the same phase.
    /// The first store failure aborts the remaining records.
    pub async fn advance(&self, pod: &Resource) -> Result<AdvanceSummary, AdvanceError> {
        let pod_name = pod.name();
        if pod_name.is_empty() {
            return Err(AdvanceError::MissingName {
                pod: pod.describe(),
            });
        }
        let labels = pod.labels().ok_or_else(|| AdvanceError::MissingLabels {
            pod: pod.describe(),
        })?;

        let label_value = |label: &str| -> Result<String, AdvanceError> {
            match labels.get(label) {
                Some(v) if !v.is_empty() => Ok(v.clone()),
                _ => Err(AdvanceError::MissingCorrelation {
                    pod: pod.describe(),
                    label: label.to_string(),
                }),
            }
        };
        let restore_name = label_value(&self.correlation.restore_name_label)?;
        let restore_uid = label_value(&self.correlation.restore_uid_label)?;

        let selector = self.selector(&restore_name, &restore_uid);
        let namespace = &self.correlation.operator_namespace;
        let records = self
            .store
            .list_volume_restores(namespace, &selector)
            .await
            .map_err(|source| AdvanceError::List {
                selector: selector.clone(),
                source,
            })?;
        debug!(
            "Found {} volume restores for {} in {}",
            records.len(),
            selector,
            namespace
        );

        let listed = records.len();
        let mut advanced = Vec::new();
        for mut record in records {
            if record.pod_name() != pod_name {
                continue;
            }
            let previous = record.status.phase.replace(self.correlation.target_phase.clone());
            self.store
                .update_volume_restore_status(namespace, &record)
                .await
                .map_err(|source| AdvanceError::Update {
                    record: record.name().to_string(),
                    source,
                })?;
            info!(
                record = %record.name(),
                pod = %pod_name,
                from = previous.as_ref().map(|p| p.as_str()).unwrap_or(""),
                to = %self.correlation.target_phase,
                "Advanced volume restore"
            );
            advanced.push(record.name().to_string());
        }

        Ok(AdvanceSummary {
            restore_name,
            restore_uid,
            listed,
            advanced,
        })
    }
}
