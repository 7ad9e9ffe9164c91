//! Rules from a local file, for running the hook outside a cluster or
//! pinning a rule set in tests.
//!
//! The file is a flat mapping of pattern to replacement, either as a JSON
//! object or a TOML table:
//!
//! ```toml
//! "staging.example.com" = "prod.example.com"
//! "team-a" = "team-b"
//! ```

use crate::store::{RuleSource, StoreError};
use crate::substitution::RuleSet;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
enum Origin {
    Fixed(RuleSet),
    File(PathBuf),
}

/// Rules that do not come from the cluster. Ignores the selector.
///
/// A file-backed source reads the file on every fetch, so a missing or
/// malformed file surfaces as a fetch error like any other rule source.
#[derive(Debug, Clone)]
pub struct StaticRuleSource {
    origin: Origin,
}

impl StaticRuleSource {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            origin: Origin::Fixed(rules),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            origin: Origin::File(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.origin {
            Origin::File(path) => Some(path),
            Origin::Fixed(_) => None,
        }
    }

    /// The current rule set.
    pub fn load(&self) -> Result<RuleSet, StoreError> {
        match &self.origin {
            Origin::Fixed(rules) => Ok(rules.clone()),
            Origin::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| rules_error(path, e))?;
                let rules = parse_rules(path, &text)?;
                debug!("Loaded {} rules from {}", rules.len(), path.display());
                Ok(rules)
            }
        }
    }
}

fn rules_error(path: &Path, message: impl ToString) -> StoreError {
    StoreError::RulesFile {
        path: path.display().to_string(),
        message: message.to_string(),
    }
}

/// `.json` is parsed as JSON, `.toml` as TOML; anything else is tried as
/// JSON first.
fn parse_rules(path: &Path, text: &str) -> Result<RuleSet, StoreError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let map: BTreeMap<String, String> = match ext.as_deref() {
        Some("json") => serde_json::from_str(text).map_err(|e| rules_error(path, e))?,
        Some("toml") => toml::from_str(text).map_err(|e| rules_error(path, e))?,
        _ => match serde_json::from_str(text) {
            Ok(map) => map,
            Err(json_err) => toml::from_str(text).map_err(|toml_err| {
                rules_error(
                    path,
                    format!("not JSON ({}) nor TOML ({})", json_err, toml_err),
                )
            })?,
        },
    };
    Ok(map.into_iter().collect())
}

#[async_trait]
impl RuleSource for StaticRuleSource {
    async fn fetch_rules(&self, _selector: &str) -> Result<RuleSet, StoreError> {
        self.load()
    }
}
