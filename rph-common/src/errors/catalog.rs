//! Error Catalog for the restore pattern hook
//!
//! Every failure the hook can log or report carries a stable code. Each
//! entry has:
//! - A unique code (RPH-E001 through RPH-E599)
//! - A human-readable message
//! - Remediation steps
//!
//! # Error Code Ranges
//!
//! | Range      | Category     | Description                              |
//! |------------|--------------|------------------------------------------|
//! | E001-E099  | Config       | Config file and environment errors       |
//! | E100-E199  | Rules        | Loading and validating substitution rules|
//! | E200-E299  | Substitution | Rewriting a resource                     |
//! | E300-E399  | Correlation  | Matching a Pod to its volume restores    |
//! | E400-E499  | Cluster      | Cluster API access                       |
//! | E500-E599  | Hook         | Host protocol and process setup          |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code enumeration covering every RPH error scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // =========================================================================
    // Config Errors (E001-E099)
    // =========================================================================
    /// Configuration file could not be read
    ConfigReadError,
    /// Configuration file contains invalid TOML syntax
    ConfigParseError,
    /// Environment variable has invalid value
    ConfigEnvError,
    /// Configuration file value is out of range
    ConfigValueError,

    // =========================================================================
    // Rules Errors (E100-E199)
    // =========================================================================
    /// Rules could not be fetched from the rule source
    RulesUnavailable,
    /// Local rules file is missing or malformed
    RulesFileInvalid,
    /// Rule set outcome depends on application order
    RulesConflict,

    // =========================================================================
    // Substitution Errors (E200-E299)
    // =========================================================================
    /// Resource could not be serialized
    SubstitutionSerialize,
    /// Substituted text is no longer valid JSON
    SubstitutionInvalidJson,
    /// Substituted document is not an object
    SubstitutionNotObject,
    /// Pod metadata disappeared during substitution
    SubstitutionIdentityLost,

    // =========================================================================
    // Correlation Errors (E300-E399)
    // =========================================================================
    /// Pod carries no labels
    CorrelationMissingLabels,
    /// Pod is missing a restore correlation label
    CorrelationMissingValue,
    /// Listing volume restores failed
    CorrelationListFailed,
    /// Writing a volume restore status failed
    CorrelationUpdateFailed,
    /// Pod has no name to match volume restores against
    CorrelationMissingName,

    // =========================================================================
    // Cluster Errors (E400-E499)
    // =========================================================================
    /// No cluster connection is configured
    ClusterUnavailable,
    /// Request could not be sent or timed out
    ClusterTransport,
    /// API answered with an error status
    ClusterStatus,
    /// Record changed since it was read
    ClusterConflict,
    /// API response could not be decoded
    ClusterDecode,

    // =========================================================================
    // Hook Errors (E500-E599)
    // =========================================================================
    /// Host input is not a valid request
    HookInvalidInput,
    /// Response could not be written
    HookOutputError,
    /// Logging could not be initialized
    HookLoggingError,
}

impl ErrorCode {
    /// Returns the numeric error code (without prefix).
    #[must_use]
    pub const fn code_number(&self) -> u16 {
        match self {
            Self::ConfigReadError => 1,
            Self::ConfigParseError => 2,
            Self::ConfigEnvError => 3,
            Self::ConfigValueError => 4,

            Self::RulesUnavailable => 100,
            Self::RulesFileInvalid => 101,
            Self::RulesConflict => 102,

            Self::SubstitutionSerialize => 200,
            Self::SubstitutionInvalidJson => 201,
            Self::SubstitutionNotObject => 202,
            Self::SubstitutionIdentityLost => 203,

            Self::CorrelationMissingLabels => 300,
            Self::CorrelationMissingValue => 301,
            Self::CorrelationListFailed => 302,
            Self::CorrelationUpdateFailed => 303,
            Self::CorrelationMissingName => 304,

            Self::ClusterUnavailable => 400,
            Self::ClusterTransport => 401,
            Self::ClusterStatus => 402,
            Self::ClusterConflict => 403,
            Self::ClusterDecode => 404,

            Self::HookInvalidInput => 500,
            Self::HookOutputError => 501,
            Self::HookLoggingError => 502,
        }
    }

    /// Returns the formatted error code string (e.g., "RPH-E001").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("RPH-E{:03}", self.code_number())
    }

    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self.code_number() {
            1..=99 => ErrorCategory::Config,
            100..=199 => ErrorCategory::Rules,
            200..=299 => ErrorCategory::Substitution,
            300..=399 => ErrorCategory::Correlation,
            400..=499 => ErrorCategory::Cluster,
            _ => ErrorCategory::Hook,
        }
    }

    /// Returns the full error entry with all metadata.
    #[must_use]
    pub fn entry(&self) -> ErrorEntry {
        ErrorEntry {
            code: self.code_string(),
            category: self.category(),
            message: self.message().to_string(),
            remediation: self
                .remediation()
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ConfigReadError => "Configuration file could not be read",
            Self::ConfigParseError => "Configuration file is not valid TOML",
            Self::ConfigEnvError => "Environment variable has an invalid value",
            Self::ConfigValueError => "Configuration file has an out-of-range value",

            Self::RulesUnavailable => "Substitution rules could not be fetched",
            Self::RulesFileInvalid => "Rules file is missing or malformed",
            Self::RulesConflict => "Substitution rules overlap",

            Self::SubstitutionSerialize => "Resource could not be serialized",
            Self::SubstitutionInvalidJson => "Substitution produced invalid JSON",
            Self::SubstitutionNotObject => "Substitution produced a non-object document",
            Self::SubstitutionIdentityLost => "Pod metadata was lost during substitution",

            Self::CorrelationMissingLabels => "Pod has no labels",
            Self::CorrelationMissingValue => "Pod is missing a restore correlation label",
            Self::CorrelationListFailed => "Volume restores could not be listed",
            Self::CorrelationUpdateFailed => "Volume restore status could not be updated",
            Self::CorrelationMissingName => "Pod has no name",

            Self::ClusterUnavailable => "Cluster API is not configured",
            Self::ClusterTransport => "Cluster API request failed",
            Self::ClusterStatus => "Cluster API returned an error",
            Self::ClusterConflict => "Record was modified concurrently",
            Self::ClusterDecode => "Cluster API response could not be decoded",

            Self::HookInvalidInput => "Host input is not a valid request",
            Self::HookOutputError => "Response could not be written",
            Self::HookLoggingError => "Logging could not be initialized",
        }
    }

    #[must_use]
    pub const fn remediation(&self) -> &'static [&'static str] {
        match self {
            Self::ConfigReadError => &[
                "Check that the path given by --config or RPH_CONFIG exists",
                "Check file permissions",
            ],
            Self::ConfigParseError => &[
                "Validate the file with a TOML linter",
                "Run 'rph config' to see the effective configuration",
            ],
            Self::ConfigEnvError => &[
                "Check RPH_* environment variables for typos",
                "Booleans accept true/false/1/0/yes/no",
            ],
            Self::ConfigValueError => &[
                "cluster.timeout_secs must be between 1 and 600",
                "Run 'rph config' to see the effective configuration",
            ],

            Self::RulesUnavailable => &[
                "Check that rule ConfigMaps exist in the operator namespace",
                "Check the service account may list configmaps",
                "Resources pass through unchanged until rules load",
            ],
            Self::RulesFileInvalid => &[
                "Rules files are a flat JSON object or TOML table of strings",
                "Run 'rph rules --check' against the file",
            ],
            Self::RulesConflict => &[
                "Run 'rph rules --check' to list overlapping rules",
                "Make sure no replacement contains another rule's pattern",
                "Set rules.strict = false to apply overlapping rules in pattern order",
            ],

            Self::SubstitutionSerialize => &["Report the resource that triggered this as a bug"],
            Self::SubstitutionInvalidJson => &[
                "A rule rewrote JSON syntax; avoid patterns containing quotes, braces, or colons",
                "Run 'rph rules --check' and test the rules against a sample resource",
            ],
            Self::SubstitutionNotObject => &[
                "A rule rewrote the document's outer structure; narrow the pattern",
            ],
            Self::SubstitutionIdentityLost => &[
                "A rule rewrote the 'metadata' key of a Pod; narrow the pattern",
            ],

            Self::CorrelationMissingLabels => &[
                "Pods restored by the operator carry restore labels; check the restore source",
            ],
            Self::CorrelationMissingValue => &[
                "Check correlation.restore_name_label and correlation.restore_uid_label",
                "Check that no rule rewrote the restore labels",
            ],
            Self::CorrelationListFailed => &[
                "Check the service account may list podvolumerestores",
                "Check correlation.operator_namespace",
            ],
            Self::CorrelationUpdateFailed => &[
                "Check the service account may update podvolumerestores/status",
                "The operator reconciles the record on its own; no action is required",
            ],
            Self::CorrelationMissingName => &[
                "Pods relying on generateName cannot be matched to volume restores",
                "The operator reconciles the records on its own; no action is required",
            ],

            Self::ClusterUnavailable => &[
                "Run inside the cluster or set cluster.api_server / RPH_API_SERVER",
            ],
            Self::ClusterTransport => &[
                "Check the API server address and network reachability",
                "Raise cluster.timeout_secs if the API server is slow",
            ],
            Self::ClusterStatus => &[
                "Check the service account's RBAC permissions",
                "Check the API server logs for the rejected request",
            ],
            Self::ClusterConflict => &[
                "The record was updated by another writer; the next invocation retries",
            ],
            Self::ClusterDecode => &[
                "Check that the API server serves velero.io/v1",
            ],

            Self::HookInvalidInput => &[
                "The host must send a JSON object with an 'item' field on stdin",
            ],
            Self::HookOutputError => &["Check that stdout is still open"],
            Self::HookLoggingError => &[
                "Check RUST_LOG / RPH_LOG_LEVEL for an invalid filter directive",
            ],
        }
    }

    /// Every defined code, in code order.
    #[must_use]
    pub const fn all() -> &'static [ErrorCode] {
        &[
            Self::ConfigReadError,
            Self::ConfigParseError,
            Self::ConfigEnvError,
            Self::ConfigValueError,
            Self::RulesUnavailable,
            Self::RulesFileInvalid,
            Self::RulesConflict,
            Self::SubstitutionSerialize,
            Self::SubstitutionInvalidJson,
            Self::SubstitutionNotObject,
            Self::SubstitutionIdentityLost,
            Self::CorrelationMissingLabels,
            Self::CorrelationMissingValue,
            Self::CorrelationListFailed,
            Self::CorrelationUpdateFailed,
            Self::CorrelationMissingName,
            Self::ClusterUnavailable,
            Self::ClusterTransport,
            Self::ClusterStatus,
            Self::ClusterConflict,
            Self::ClusterDecode,
            Self::HookInvalidInput,
            Self::HookOutputError,
            Self::HookLoggingError,
        ]
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_string(), self.message())
    }
}

/// Error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Rules,
    Substitution,
    Correlation,
    Cluster,
    Hook,
}

impl ErrorCategory {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config => "Configuration",
            Self::Rules => "Rules",
            Self::Substitution => "Substitution",
            Self::Correlation => "Correlation",
            Self::Cluster => "Cluster",
            Self::Hook => "Hook",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Complete error entry with all metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    /// Error code string (e.g., "RPH-E001")
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
    /// Steps to remediate the error
    pub remediation: Vec<String>,
}

impl ErrorEntry {
    /// Formats the error for display with full remediation steps.
    #[must_use]
    pub fn format_full(&self) -> String {
        let mut output = format!("[{}] {}\n", self.code, self.message);
        if !self.remediation.is_empty() {
            output.push_str("\nRemediation steps:\n");
            for (i, step) in self.remediation.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }
        output
    }

    #[must_use]
    pub fn format_brief(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_brief())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_numbers_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ErrorCode::all() {
            assert!(
                seen.insert(code.code_number()),
                "Duplicate code number for {:?}",
                code
            );
        }
    }

    #[test]
    fn test_all_is_sorted() {
        let numbers: Vec<u16> = ErrorCode::all().iter().map(|c| c.code_number()).collect();
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        assert_eq!(numbers, sorted);
    }

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigReadError.code_string(), "RPH-E001");
        assert_eq!(ErrorCode::ConfigValueError.code_string(), "RPH-E004");
        assert_eq!(ErrorCode::RulesConflict.code_string(), "RPH-E102");
        assert_eq!(ErrorCode::HookLoggingError.code_string(), "RPH-E502");
    }

    #[test]
    fn test_all_errors_have_message_and_remediation() {
        for code in ErrorCode::all() {
            assert!(!code.message().is_empty(), "{:?} has empty message", code);
            assert!(
                !code.remediation().is_empty(),
                "{:?} has no remediation steps",
                code
            );
        }
    }

    #[test]
    fn test_category_ranges() {
        assert_eq!(ErrorCode::ConfigEnvError.category(), ErrorCategory::Config);
        assert_eq!(ErrorCode::RulesFileInvalid.category(), ErrorCategory::Rules);
        assert_eq!(
            ErrorCode::SubstitutionIdentityLost.category(),
            ErrorCategory::Substitution
        );
        assert_eq!(
            ErrorCode::CorrelationUpdateFailed.category(),
            ErrorCategory::Correlation
        );
        assert_eq!(ErrorCode::ClusterConflict.category(), ErrorCategory::Cluster);
        assert_eq!(ErrorCode::HookInvalidInput.category(), ErrorCategory::Hook);
    }

    #[test]
    fn test_error_entry_serialization() {
        let entry = ErrorCode::RulesConflict.entry();
        let json = serde_json::to_string(&entry).expect("serialization failed");
        assert!(json.contains("RPH-E102"));
        assert!(json.contains("\"rules\""));

        let parsed: ErrorEntry = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::ClusterConflict).unwrap();
        assert_eq!(json, "\"CLUSTER_CONFLICT\"");
    }

    #[test]
    fn test_format_full_and_brief() {
        let entry = ErrorCode::SubstitutionIdentityLost.entry();
        assert_eq!(
            entry.format_brief(),
            "[RPH-E203] Pod metadata was lost during substitution"
        );
        let full = entry.format_full();
        assert!(full.starts_with("[RPH-E203]"));
        assert!(full.contains("Remediation steps:"));
        assert!(full.contains("  1. "));
    }
}
