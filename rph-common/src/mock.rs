//! In-memory rule sources and record stores.
//!
//! Used by unit and integration tests in place of the cluster API. The store
//! honours label selectors and resourceVersion checks the way the API server
//! does, so concurrency behaviour can be exercised without a cluster.

use crate::store::{RuleSource, StoreError, VolumeRestoreStore};
use crate::substitution::RuleSet;
use crate::types::{
    ObjectMeta, PodReference, PodVolumeRestore, PodVolumeRestoreSpec, PodVolumeRestoreStatus,
    VolumeRestorePhase,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Build a volume-restore record in phase `New` for tests.
pub fn pod_volume_restore(name: &str, restore: &str, uid: &str, pod: &str) -> PodVolumeRestore {
    let mut labels = BTreeMap::new();
    labels.insert("velero.io/restore-name".to_string(), restore.to_string());
    labels.insert("velero.io/restore-uid".to_string(), uid.to_string());
    PodVolumeRestore {
        api_version: "velero.io/v1".to_string(),
        kind: "PodVolumeRestore".to_string(),
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: Some("velero".to_string()),
            labels,
            resource_version: Some("1".to_string()),
            ..Default::default()
        },
        spec: PodVolumeRestoreSpec {
            pod: PodReference {
                name: pod.to_string(),
                ..Default::default()
            },
            ..Default::default()
        },
        status: PodVolumeRestoreStatus {
            phase: Some(VolumeRestorePhase::New),
            ..Default::default()
        },
    }
}

/// Does `labels` satisfy an equality-based selector like `a=b,c=d`?
pub fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => {
                let key = key.trim_end_matches('=').trim();
                labels.get(key).map(String::as_str) == Some(value.trim_start_matches('=').trim())
            }
            None => labels.contains_key(term),
        })
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<PodVolumeRestore>,
    list_error: Option<String>,
    update_error: Option<String>,
}

/// An in-memory [`VolumeRestoreStore`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<StoreState>>,
    lists: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert(&self, record: PodVolumeRestore) {
        self.state().records.push(record);
    }

    pub fn get(&self, name: &str) -> Option<PodVolumeRestore> {
        self.state()
            .records
            .iter()
            .find(|r| r.name() == name)
            .cloned()
    }

    pub fn phase(&self, name: &str) -> Option<VolumeRestorePhase> {
        self.get(name).and_then(|r| r.status.phase)
    }

    /// Make every subsequent list call fail with `message`.
    pub fn fail_list(&self, message: impl Into<String>) {
        self.state().list_error = Some(message.into());
    }

    /// Make every subsequent update call fail with `message`.
    pub fn fail_updates(&self, message: impl Into<String>) {
        self.state().update_error = Some(message.into());
    }

    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    /// Number of update attempts, failed ones included.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VolumeRestoreStore for MockStore {
    async fn list_volume_restores(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodVolumeRestore>, StoreError> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        if let Some(message) = &state.list_error {
            return Err(StoreError::Unavailable(message.clone()));
        }
        Ok(state
            .records
            .iter()
            .filter(|r| r.metadata.namespace.as_deref().unwrap_or(namespace) == namespace)
            .filter(|r| selector_matches(label_selector, &r.metadata.labels))
            .cloned()
            .collect())
    }

    async fn update_volume_restore_status(
        &self,
        namespace: &str,
        record: &PodVolumeRestore,
    ) -> Result<PodVolumeRestore, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(message) = &state.update_error {
            return Err(StoreError::Unavailable(message.clone()));
        }
        let stored = state
            .records
            .iter_mut()
            .filter(|r| r.metadata.namespace.as_deref().unwrap_or(namespace) == namespace)
            .find(|r| r.name() == record.name())
            .ok_or_else(|| StoreError::Status {
                method: "PUT",
                url: format!(
                    "mock://namespaces/{}/podvolumerestores/{}/status",
                    namespace,
                    record.name()
                ),
                status: 404,
                message: "not found".to_string(),
            })?;

        if record.metadata.resource_version.is_some()
            && record.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(StoreError::Conflict {
                name: record.name().to_string(),
                message: "the object has been modified".to_string(),
            });
        }

        let next_version = stored
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        stored.status = record.status.clone();
        stored.metadata.resource_version = Some(next_version.to_string());
        Ok(stored.clone())
    }
}

/// A [`RuleSource`] returning a fixed rule set or a fixed error.
#[derive(Debug, Clone)]
pub struct MockRuleSource {
    result: Result<RuleSet, String>,
    fetches: Arc<AtomicUsize>,
    last_selector: Arc<Mutex<Option<String>>>,
}

impl MockRuleSource {
    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            result: Ok(rules),
            fetches: Arc::default(),
            last_selector: Arc::default(),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            fetches: Arc::default(),
            last_selector: Arc::default(),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_selector(&self) -> Option<String> {
        self.last_selector
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl RuleSource for MockRuleSource {
    async fn fetch_rules(&self, selector: &str) -> Result<RuleSet, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_selector.lock().unwrap_or_else(|e| e.into_inner()) = Some(selector.to_string());
        self.result.clone().map_err(StoreError::Unavailable)
    }
}
