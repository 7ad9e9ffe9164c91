//! Restore Pattern Hook - Common Library
//!
//! Shared types and logic for the `rph` restore hook: literal text
//! substitution over restored resources, volume-restore phase advancement
//! for restored Pods, and the cluster client both depend on.

pub mod action;
pub mod advance;
pub mod config;
pub mod errors;
pub mod kube;
pub mod logging;
pub mod mock;
pub mod protocol;
pub mod rules_file;
pub mod store;
pub mod substitution;
pub mod types;

pub use action::{AdvanceOutcome, Execution, HookError, RestoreHook, RulesOutcome};
pub use advance::{AdvanceError, AdvanceSummary, StatusAdvancer};
pub use config::{
    ClusterConfig, ConfigError, ConfigSource, ConfigValueSource, CorrelationConfig, HookConfig,
    LoadedConfig, LoggingConfig, RulesConfig, load_config,
};
pub use errors::{ErrorCategory, ErrorCode, ErrorEntry};
pub use kube::{ApiClient, ConfigMapRuleSource};
pub use logging::{LogConfig, LogFormat, LoggingError, LoggingGuards, init_logging};
pub use protocol::{ExecuteInput, ExecuteOutput, ResourceSelector};
pub use rules_file::StaticRuleSource;
pub use store::{RuleSource, StoreError, VolumeRestoreStore};
pub use substitution::{RuleConflict, RuleSet, SubstitutionError};
pub use types::{PodVolumeRestore, Resource, VolumeRestorePhase};
