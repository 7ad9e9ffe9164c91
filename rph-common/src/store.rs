//! Seams to the cluster: where rules come from and where volume-restore
//! records live.
//!
//! [`crate::kube::ApiClient`] implements both traits against the cluster API;
//! [`crate::mock`] provides in-memory versions for tests and offline runs.

use crate::substitution::RuleSet;
use crate::types::PodVolumeRestore;
use async_trait::async_trait;
use thiserror::Error;

/// Failures talking to the rule source or the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No cluster connection could be configured.
    #[error("cluster API unavailable: {0}")]
    Unavailable(String),

    /// Transport-level failure (connect, TLS, timeout).
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("{method} {url} returned {status}: {message}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        message: String,
    },

    /// The record changed since it was read (resourceVersion mismatch).
    #[error("conflict updating {name}: {message}")]
    Conflict { name: String, message: String },

    /// The response body could not be decoded.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A local rules file could not be read or parsed.
    #[error("failed to load rules from {path}: {message}")]
    RulesFile { path: String, message: String },
}

/// Supplies the substitution rules for an invocation.
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Fetch and merge the rules of every configuration object matching
    /// `selector`. Later objects win on duplicate patterns.
    async fn fetch_rules(&self, selector: &str) -> Result<RuleSet, StoreError>;
}

/// Read and write access to volume-restore records.
#[async_trait]
pub trait VolumeRestoreStore: Send + Sync {
    async fn list_volume_restores(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodVolumeRestore>, StoreError>;

    /// Persist `record.status` through the status subresource, guarded by
    /// the record's resourceVersion.
    async fn update_volume_restore_status(
        &self,
        namespace: &str,
        record: &PodVolumeRestore,
    ) -> Result<PodVolumeRestore, StoreError>;
}
