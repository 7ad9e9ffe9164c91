//! Configuration system for RPH.
//!
//! Every well-known name the hook depends on (operator namespace, correlation
//! labels, rule selector, target phase) is a setting with a documented
//! default. Values are resolved in three layers:
//! - built-in defaults
//! - a TOML file (`--config`, `RPH_CONFIG`, or `~/.config/rph/config.toml`)
//! - `RPH_*` environment variables
//!
//! Each effective value remembers which layer set it, for `rph config`.

pub mod env;
pub mod source;

pub use env::{EnvError, EnvParser, expand_home};
pub use source::{ConfigSource, ConfigValueSource, Sourced};

use crate::logging::LogFormat;
use crate::types::VolumeRestorePhase;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Namespace holding the volume-restore records and rule ConfigMaps.
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "velero";
/// Label carrying the restore name on restored Pods and volume restores.
pub const DEFAULT_RESTORE_NAME_LABEL: &str = "velero.io/restore-name";
/// Label carrying the restore UID on restored Pods and volume restores.
pub const DEFAULT_RESTORE_UID_LABEL: &str = "velero.io/restore-uid";
/// Selects the ConfigMaps whose data are substitution rules.
pub const DEFAULT_RULE_SELECTOR: &str = "agoracalyce.io/replace-pattern=RestoreItemAction";
/// In-cluster service account token.
pub const DEFAULT_TOKEN_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
/// In-cluster service account CA bundle.
pub const DEFAULT_CA_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Accepted range for `cluster.timeout_secs`, from the file or the environment.
pub const TIMEOUT_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=600;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{key} = {value} in {path} is out of range ({min}..={max})")]
    OutOfRange {
        path: PathBuf,
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("invalid environment configuration: {}", format_env_errors(.0))]
    Env(Vec<EnvError>),
}

fn format_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// How a Pod is correlated with its volume-restore records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub operator_namespace: String,
    pub restore_name_label: String,
    pub restore_uid_label: String,
    /// Phase written to matched records.
    pub target_phase: VolumeRestorePhase,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            operator_namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            restore_name_label: DEFAULT_RESTORE_NAME_LABEL.to_string(),
            restore_uid_label: DEFAULT_RESTORE_UID_LABEL.to_string(),
            target_phase: VolumeRestorePhase::InProgress,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Label selector for rule ConfigMaps.
    pub selector: String,
    /// Refuse rule sets whose outcome depends on application order.
    pub strict: bool,
    /// Read rules from this JSON or TOML file instead of the cluster.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            selector: DEFAULT_RULE_SELECTOR.to_string(),
            strict: false,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// API server URL; discovered from the in-cluster environment when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_server: Option<String>,
    pub token_file: PathBuf,
    pub ca_file: PathBuf,
    pub timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            ca_file: PathBuf::from(DEFAULT_CA_FILE),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Complete hook configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub correlation: CorrelationConfig,
    pub rules: RulesConfig,
    pub cluster: ClusterConfig,
    pub logging: LoggingConfig,
}

/// The effective configuration plus where each value came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: HookConfig,
    pub path: Option<PathBuf>,
    pub sources: Vec<ConfigValueSource>,
}

/// Default config file location, if a config directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rph").join("config.toml"))
}

/// Parse a config file. Missing sections and keys take their defaults.
pub fn load_file(path: &Path) -> Result<(HookConfig, toml::Table), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: HookConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_file(path, &config)?;
    Ok((config, table))
}

/// File values get the same bounds as their `RPH_*` twins.
fn validate_file(path: &Path, config: &HookConfig) -> Result<(), ConfigError> {
    let timeout = config.cluster.timeout_secs;
    if !TIMEOUT_SECS_RANGE.contains(&timeout) {
        return Err(ConfigError::OutOfRange {
            path: path.to_path_buf(),
            key: "cluster.timeout_secs",
            value: timeout,
            min: *TIMEOUT_SECS_RANGE.start(),
            max: *TIMEOUT_SECS_RANGE.end(),
        });
    }
    Ok(())
}

/// Resolve the configuration.
///
/// `explicit` wins over `RPH_CONFIG`, which wins over the default path. An
/// explicit or `RPH_CONFIG` path must exist; the default path is optional.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let mut parser = EnvParser::new();
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => match parser.get_path("CONFIG") {
            Some(sourced) => Some(sourced.value),
            None => default_config_path().filter(|p| p.exists()),
        },
    };

    let (config, table) = match &path {
        Some(p) => {
            debug!("Loading configuration from {:?}", p);
            load_file(p)?
        }
        None => (HookConfig::default(), toml::Table::new()),
    };

    let mut resolver = Resolver {
        parser,
        table,
        path: path.as_ref().map(|p| p.display().to_string()),
        sources: Vec::new(),
    };
    let config = resolver.resolve(config);

    let errors = resolver.parser.take_errors();
    if !errors.is_empty() {
        return Err(ConfigError::Env(errors));
    }

    Ok(LoadedConfig {
        config,
        path,
        sources: resolver.sources,
    })
}

/// Applies environment overrides on top of file values and records sources.
struct Resolver {
    parser: EnvParser,
    table: toml::Table,
    path: Option<String>,
    sources: Vec<ConfigValueSource>,
}

impl Resolver {
    fn file_has(&self, section: &str, key: &str) -> bool {
        self.table
            .get(section)
            .and_then(|s| s.as_table())
            .is_some_and(|s| s.contains_key(key))
    }

    fn record<T: ToString>(
        &mut self,
        key: &'static str,
        section: &str,
        field: &str,
        value: &T,
        env: Option<String>,
    ) {
        let (source, origin) = match env {
            Some(var) => (ConfigSource::Environment, Some(var)),
            None if self.file_has(section, field) => (ConfigSource::File, self.path.clone()),
            None => (ConfigSource::Default, None),
        };
        self.sources.push(ConfigValueSource {
            key,
            value: value.to_string(),
            source,
            origin,
        });
    }

    fn string(&mut self, key: &'static str, var: &str, target: &mut String) {
        let (section, field) = split_key(key);
        let env = self.parser.get_string(var).map(|s| {
            *target = s.value;
            s.origin.unwrap_or_default()
        });
        self.record(key, section, field, &*target, env);
    }

    fn resolve(&mut self, mut config: HookConfig) -> HookConfig {
        self.string(
            "correlation.operator_namespace",
            "NAMESPACE",
            &mut config.correlation.operator_namespace,
        );
        self.string(
            "correlation.restore_name_label",
            "RESTORE_NAME_LABEL",
            &mut config.correlation.restore_name_label,
        );
        self.string(
            "correlation.restore_uid_label",
            "RESTORE_UID_LABEL",
            &mut config.correlation.restore_uid_label,
        );

        let env = self.parser.get_string("TARGET_PHASE").map(|s| {
            config.correlation.target_phase = VolumeRestorePhase::from(s.value);
            s.origin.unwrap_or_default()
        });
        self.record(
            "correlation.target_phase",
            "correlation",
            "target_phase",
            &config.correlation.target_phase,
            env,
        );

        self.string("rules.selector", "RULE_SELECTOR", &mut config.rules.selector);

        let env = self.parser.get_bool("STRICT_RULES").map(|s| {
            config.rules.strict = s.value;
            s.origin.unwrap_or_default()
        });
        self.record("rules.strict", "rules", "strict", &config.rules.strict, env);

        let env = self.parser.get_path("RULES_FILE").map(|s| {
            config.rules.file = Some(s.value);
            s.origin.unwrap_or_default()
        });
        let file = display_optional(config.rules.file.as_ref().map(|p| p.display().to_string()));
        self.record("rules.file", "rules", "file", &file, env);

        let env = self.parser.get_optional_string("API_SERVER").map(|s| {
            config.cluster.api_server = s.value;
            s.origin.unwrap_or_default()
        });
        let api_server = display_optional(config.cluster.api_server.clone());
        self.record("cluster.api_server", "cluster", "api_server", &api_server, env);

        let env = self.parser.get_path("TOKEN_FILE").map(|s| {
            config.cluster.token_file = s.value;
            s.origin.unwrap_or_default()
        });
        let token_file = config.cluster.token_file.display().to_string();
        self.record("cluster.token_file", "cluster", "token_file", &token_file, env);

        let env = self.parser.get_path("CA_FILE").map(|s| {
            config.cluster.ca_file = s.value;
            s.origin.unwrap_or_default()
        });
        let ca_file = config.cluster.ca_file.display().to_string();
        self.record("cluster.ca_file", "cluster", "ca_file", &ca_file, env);

        let env = self.parser.get_u64_range(
            "TIMEOUT_SECS",
            *TIMEOUT_SECS_RANGE.start(),
            *TIMEOUT_SECS_RANGE.end(),
        ).map(|s| {
            config.cluster.timeout_secs = s.value;
            s.origin.unwrap_or_default()
        });
        self.record(
            "cluster.timeout_secs",
            "cluster",
            "timeout_secs",
            &config.cluster.timeout_secs,
            env,
        );

        let env = self.parser.get_log_level("LOG_LEVEL").map(|s| {
            config.logging.level = s.value;
            s.origin.unwrap_or_default()
        });
        self.record("logging.level", "logging", "level", &config.logging.level, env);

        let format_var = self.parser.var_name("LOG_FORMAT");
        let env = match self.parser.get_string("LOG_FORMAT") {
            Some(s) => match s.value.parse::<LogFormat>() {
                Ok(format) => {
                    config.logging.format = format;
                    Some(format_var)
                }
                Err(_) => {
                    self.parser.push_error(EnvError::InvalidValue {
                        var: format_var,
                        expected: "pretty or json".to_string(),
                        value: s.value,
                    });
                    None
                }
            },
            None => None,
        };
        self.record("logging.format", "logging", "format", &config.logging.format, env);

        config
    }
}

fn split_key(key: &'static str) -> (&'static str, &'static str) {
    key.split_once('.').unwrap_or(("", key))
}

fn display_optional(value: Option<String>) -> String {
    value.unwrap_or_else(|| "<unset>".to_string())
}
