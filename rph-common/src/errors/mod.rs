//! Error catalog and the mapping from library errors to catalog codes.
//!
//! Warnings and fatal errors are logged with their `RPH-Exxx` code so an
//! operator can look up remediation with `rph explain <code>`.

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::advance::AdvanceError;
use crate::config::ConfigError;
use crate::store::StoreError;
use crate::substitution::SubstitutionError;

impl StoreError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Unavailable(_) => ErrorCode::ClusterUnavailable,
            StoreError::Transport { .. } => ErrorCode::ClusterTransport,
            StoreError::Status { .. } => ErrorCode::ClusterStatus,
            StoreError::Conflict { .. } => ErrorCode::ClusterConflict,
            StoreError::Decode { .. } => ErrorCode::ClusterDecode,
            StoreError::RulesFile { .. } => ErrorCode::RulesFileInvalid,
        }
    }
}

impl SubstitutionError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            SubstitutionError::Serialize { .. } => ErrorCode::SubstitutionSerialize,
            SubstitutionError::Deserialize { .. } => ErrorCode::SubstitutionInvalidJson,
            SubstitutionError::NotAnObject { .. } => ErrorCode::SubstitutionNotObject,
            SubstitutionError::IdentityLost { .. } => ErrorCode::SubstitutionIdentityLost,
        }
    }
}

impl AdvanceError {
    /// Store failures keep the more specific cluster code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            AdvanceError::MissingName { .. } => ErrorCode::CorrelationMissingName,
            AdvanceError::MissingLabels { .. } => ErrorCode::CorrelationMissingLabels,
            AdvanceError::MissingCorrelation { .. } => ErrorCode::CorrelationMissingValue,
            AdvanceError::List { source, .. } => match source {
                StoreError::Unavailable(_) | StoreError::Conflict { .. } => source.code(),
                _ => ErrorCode::CorrelationListFailed,
            },
            AdvanceError::Update { source, .. } => match source {
                StoreError::Unavailable(_) | StoreError::Conflict { .. } => source.code(),
                _ => ErrorCode::CorrelationUpdateFailed,
            },
        }
    }
}

impl ConfigError {
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::Read { .. } => ErrorCode::ConfigReadError,
            ConfigError::Parse { .. } => ErrorCode::ConfigParseError,
            ConfigError::Env(_) => ErrorCode::ConfigEnvError,
            ConfigError::OutOfRange { .. } => ErrorCode::ConfigValueError,
        }
    }
}

/// Look up a code by its `RPH-Exxx` string, its number, or its name.
pub fn lookup(query: &str) -> Option<ErrorCode> {
    let trimmed = query.trim();
    let upper = trimmed.to_ascii_uppercase();
    let digits = upper
        .strip_prefix("RPH-E")
        .or_else(|| upper.strip_prefix('E'))
        .unwrap_or(&upper);
    if let Ok(number) = digits.parse::<u16>() {
        return ErrorCode::all()
            .iter()
            .copied()
            .find(|c| c.code_number() == number);
    }
    ErrorCode::all().iter().copied().find(|c| {
        serde_json::to_value(c)
            .ok()
            .and_then(|v| v.as_str().map(|s| s == upper))
            .unwrap_or(false)
    })
}
