//! Minimal cluster API client.
//!
//! Covers exactly the calls the hook makes: listing rule ConfigMaps,
//! listing volume restores by label, and writing a volume restore's status
//! subresource. Authentication is the in-cluster service account (bearer
//! token plus CA bundle), or an explicit API server URL such as a
//! `kubectl proxy` endpoint.

use crate::config::ClusterConfig;
use crate::store::{RuleSource, StoreError, VolumeRestoreStore};
use crate::substitution::RuleSet;
use crate::types::{ConfigMap, ObjectList, PodVolumeRestore};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

const VOLUME_RESTORE_API: &str = "/apis/velero.io/v1";

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
struct Connection {
    base: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("base", &self.base)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Cluster API client. Cheap to clone.
///
/// A client built without a usable connection answers every call with
/// [`StoreError::Unavailable`], so the hook keeps running fail-open.
#[derive(Debug, Clone)]
pub struct ApiClient {
    conn: Result<Connection, String>,
}

impl ApiClient {
    /// Build a client from configuration and the in-cluster environment.
    pub fn from_config(config: &ClusterConfig) -> Result<Self, StoreError> {
        let base = match &config.api_server {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => in_cluster_base()?,
        };

        let token = match std::fs::read_to_string(&config.token_file) {
            Ok(t) if !t.trim().is_empty() => Some(t.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                debug!("No service account token at {:?}: {}", config.token_file, e);
                None
            }
        };

        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));
        if base.starts_with("https://") {
            match std::fs::read(&config.ca_file) {
                Ok(pem) => {
                    let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                        StoreError::Unavailable(format!(
                            "invalid CA bundle {}: {}",
                            config.ca_file.display(),
                            e
                        ))
                    })?;
                    builder = builder.add_root_certificate(cert);
                }
                Err(e) => {
                    debug!("No CA bundle at {:?}: {}", config.ca_file, e);
                }
            }
        }
        let http = builder
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        debug!("Cluster API at {}", base);
        Ok(Self {
            conn: Ok(Connection { base, http, token }),
        })
    }

    /// A client that fails every call with `reason`.
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self {
            conn: Err(reason.into()),
        }
    }

    /// [`from_config`](Self::from_config), falling back to a disconnected
    /// client with a warning.
    pub fn connect_or_disconnected(config: &ClusterConfig) -> Self {
        match Self::from_config(config) {
            Ok(client) => client,
            Err(e) => {
                warn!("Cluster API not configured, continuing without it: {}", e);
                Self::disconnected(e.to_string())
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_ok()
    }

    /// The API server base URL, if connected.
    pub fn base_url(&self) -> Option<&str> {
        self.conn.as_ref().ok().map(|c| c.base.as_str())
    }

    fn connection(&self) -> Result<&Connection, StoreError> {
        self.conn
            .as_ref()
            .map_err(|reason| StoreError::Unavailable(reason.clone()))
    }

    fn authorize(&self, conn: &Connection, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &conn.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, StoreError> {
        let conn = self.connection()?;
        let mut url = reqwest::Url::parse(&format!("{}{}", conn.base, path)).map_err(|e| {
            StoreError::Unavailable(format!("invalid API server URL {}: {}", conn.base, e))
        })?;
        url.query_pairs_mut().extend_pairs(query);
        let display = url.to_string();
        let req = self.authorize(conn, conn.http.get(url));
        let resp = req.send().await.map_err(|source| StoreError::Transport {
            url: display.clone(),
            source,
        })?;
        decode(resp, "GET", &display, None).await
    }

    async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        name: &str,
        body: &B,
    ) -> Result<T, StoreError> {
        let conn = self.connection()?;
        let url = format!("{}{}", conn.base, path);
        let req = self.authorize(conn, conn.http.put(&url).json(body));
        let resp = req.send().await.map_err(|source| StoreError::Transport {
            url: url.clone(),
            source,
        })?;
        decode(resp, "PUT", &url, Some(name)).await
    }

    /// List ConfigMaps in `namespace` matching `label_selector`.
    pub async fn list_config_maps(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<ConfigMap>, StoreError> {
        let path = format!("/api/v1/namespaces/{}/configmaps", namespace);
        let list: ObjectList<ConfigMap> = self
            .get_json(&path, &[("labelSelector", label_selector)])
            .await?;
        Ok(list.items)
    }
}

fn in_cluster_base() -> Result<String, StoreError> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").map_err(|_| {
        StoreError::Unavailable(
            "KUBERNETES_SERVICE_HOST is not set and no api_server is configured".to_string(),
        )
    })?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    if host.contains(':') {
        Ok(format!("https://[{}]:{}", host, port))
    } else {
        Ok(format!("https://{}:{}", host, port))
    }
}

async fn decode<T: DeserializeOwned>(
    resp: reqwest::Response,
    method: &'static str,
    url: &str,
    name: Option<&str>,
) -> Result<T, StoreError> {
    let status = resp.status();
    if status.is_success() {
        let body = resp.bytes().await.map_err(|source| StoreError::Transport {
            url: url.to_string(),
            source,
        })?;
        return serde_json::from_slice(&body).map_err(|e| StoreError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        });
    }

    let body = resp.text().await.unwrap_or_default();
    let message = status_message(&body);
    if status == reqwest::StatusCode::CONFLICT {
        return Err(StoreError::Conflict {
            name: name.unwrap_or(url).to_string(),
            message,
        });
    }
    Err(StoreError::Status {
        method,
        url: url.to_string(),
        status: status.as_u16(),
        message,
    })
}

/// Pull `message` out of a `Status` body, or fall back to the raw text.
fn status_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && let Some(message) = value.get("message").and_then(|m| m.as_str())
    {
        return message.to_string();
    }
    let mut raw = body.trim().to_string();
    if raw.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !raw.is_char_boundary(cut) {
            cut -= 1;
        }
        raw.truncate(cut);
        raw.push('…');
    }
    raw
}

#[async_trait]
impl VolumeRestoreStore for ApiClient {
    async fn list_volume_restores(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<PodVolumeRestore>, StoreError> {
        let path = format!(
            "{}/namespaces/{}/podvolumerestores",
            VOLUME_RESTORE_API, namespace
        );
        let list: ObjectList<PodVolumeRestore> = self
            .get_json(&path, &[("labelSelector", label_selector)])
            .await?;
        Ok(list.items)
    }

    async fn update_volume_restore_status(
        &self,
        namespace: &str,
        record: &PodVolumeRestore,
    ) -> Result<PodVolumeRestore, StoreError> {
        let path = format!(
            "{}/namespaces/{}/podvolumerestores/{}/status",
            VOLUME_RESTORE_API,
            namespace,
            record.name()
        );
        self.put_json(&path, record.name(), record).await
    }
}

/// Rules from the data of every ConfigMap matching the selector.
#[derive(Debug, Clone)]
pub struct ConfigMapRuleSource {
    client: ApiClient,
    namespace: String,
}

impl ConfigMapRuleSource {
    pub fn new(client: ApiClient, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl RuleSource for ConfigMapRuleSource {
    /// ConfigMaps are merged in list order (by name); later ones win.
    async fn fetch_rules(&self, selector: &str) -> Result<RuleSet, StoreError> {
        let config_maps = self.client.list_config_maps(&self.namespace, selector).await?;
        let mut rules = RuleSet::new();
        for cm in config_maps {
            debug!(
                "Loaded {} rules from ConfigMap {}/{}",
                cm.data.len(),
                self.namespace,
                cm.metadata.name
            );
            rules.merge(cm.data.into_iter().collect());
        }
        Ok(rules)
    }
}
