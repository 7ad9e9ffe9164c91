//! Environment variable parsing with type safety.
//!
//! Provides a type-safe parser for RPH environment variables with
//! validation, error collection, and source tracking.

use super::source::Sourced;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during environment variable parsing.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Invalid value for a variable.
    #[error("Invalid value for {var}: expected {expected}, got '{value}'")]
    InvalidValue {
        var: String,
        expected: String,
        value: String,
    },

    /// Value out of valid range.
    #[error("Value out of range for {var}: {value} (valid: {min}..={max})")]
    OutOfRange {
        var: String,
        value: String,
        min: String,
        max: String,
    },

    /// Invalid log level.
    #[error("Invalid log level for {var}: {value}")]
    InvalidLogLevel { var: String, value: String },
}

/// Type-safe environment variable parser.
///
/// Collects errors during parsing so all issues can be reported at once.
pub struct EnvParser {
    prefix: &'static str,
    errors: Vec<EnvError>,
}

impl EnvParser {
    /// Create a new parser with the RPH_ prefix.
    pub fn new() -> Self {
        Self {
            prefix: "RPH_",
            errors: Vec::new(),
        }
    }

    /// Get all accumulated errors.
    pub fn errors(&self) -> &[EnvError] {
        &self.errors
    }

    /// Check if any errors occurred.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Take ownership of errors.
    pub fn take_errors(&mut self) -> Vec<EnvError> {
        std::mem::take(&mut self.errors)
    }

    /// Record an error found by a caller-side parse.
    pub fn push_error(&mut self, error: EnvError) {
        self.errors.push(error);
    }

    /// Get the full variable name with prefix.
    pub fn var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Get a string value, `None` if the variable is unset.
    pub fn get_string(&mut self, name: &str) -> Option<Sourced<String>> {
        let var_name = self.var_name(name);
        env::var(&var_name)
            .ok()
            .map(|value| Sourced::from_env(value, var_name))
    }

    /// Get a boolean value, `None` if the variable is unset.
    ///
    /// Accepts: 1, true, yes, on (for true)
    ///          0, false, no, off, "" (for false)
    pub fn get_bool(&mut self, name: &str) -> Option<Sourced<bool>> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        let parsed = match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" | "" => false,
            _ => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "boolean (true/false/1/0/yes/no)".to_string(),
                    value,
                });
                return None;
            }
        };
        Some(Sourced::from_env(parsed, var_name))
    }

    /// Get a u64 value with range validation, `None` if unset or invalid.
    pub fn get_u64_range(&mut self, name: &str, min: u64, max: u64) -> Option<Sourced<u64>> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        match value.parse::<u64>() {
            Ok(n) if n >= min && n <= max => Some(Sourced::from_env(n, var_name)),
            Ok(n) => {
                self.errors.push(EnvError::OutOfRange {
                    var: var_name,
                    value: n.to_string(),
                    min: min.to_string(),
                    max: max.to_string(),
                });
                None
            }
            Err(_) => {
                self.errors.push(EnvError::InvalidValue {
                    var: var_name,
                    expected: "unsigned 64-bit integer".to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Get a path value with ~ expansion, `None` if unset.
    pub fn get_path(&mut self, name: &str) -> Option<Sourced<PathBuf>> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        Some(Sourced::from_env(expand_home(&value), var_name))
    }

    /// Get an optional string; an empty value clears the setting.
    pub fn get_optional_string(&mut self, name: &str) -> Option<Sourced<Option<String>>> {
        let var_name = self.var_name(name);
        match env::var(&var_name) {
            Ok(value) if value.is_empty() => Some(Sourced::from_env(None, var_name)),
            Ok(value) => Some(Sourced::from_env(Some(value), var_name)),
            Err(_) => None,
        }
    }

    /// Get a log level value with validation.
    pub fn get_log_level(&mut self, name: &str) -> Option<Sourced<String>> {
        let var_name = self.var_name(name);
        let value = env::var(&var_name).ok()?;
        let lower = value.to_lowercase();
        match lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" | "off" => {
                Some(Sourced::from_env(lower, var_name))
            }
            _ => {
                self.errors.push(EnvError::InvalidLogLevel {
                    var: var_name,
                    value,
                });
                None
            }
        }
    }
}

impl Default for EnvParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(value: &str) -> PathBuf {
    if let Some(stripped) = value.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(value)
}
