//! Literal text substitution over serialized resources.
//!
//! A resource is rendered to JSON text, every rule is applied as a global
//! literal replacement over the accumulated text, and the result is parsed
//! back. Rules run in lexicographic pattern order, so a later pattern may
//! match text introduced by an earlier replacement. [`RuleSet::conflicts`]
//! reports the rule pairs for which that can happen.
//!
//! For Pods the `metadata.name` captured before substitution is written back
//! afterwards: volume-restore records reference Pods by name.

use crate::types::Resource;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from [`apply`]. All of them are fatal for the invocation.
#[derive(Debug, Error)]
pub enum SubstitutionError {
    #[error("failed to serialize {kind} resource: {source}")]
    Serialize {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("substituted {kind} resource is no longer valid JSON: {source}")]
    Deserialize {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("substituted {kind} resource is not a JSON object")]
    NotAnObject { kind: String },

    #[error("cannot restore metadata.name '{name}': substituted Pod has no metadata mapping")]
    IdentityLost { name: String },
}

/// An immutable mapping from literal pattern to literal replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: BTreeMap<String, String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, replacing any earlier rule with the same pattern.
    ///
    /// Empty patterns are dropped: replacing "" would splice the replacement
    /// between every character of the document.
    pub fn insert(&mut self, pattern: impl Into<String>, replacement: impl Into<String>) {
        let pattern = pattern.into();
        if pattern.is_empty() {
            warn!("Ignoring substitution rule with empty pattern");
            return;
        }
        self.rules.insert(pattern, replacement.into());
    }

    /// Merge `other` into this set; rules from `other` win on duplicate patterns.
    pub fn merge(&mut self, other: RuleSet) {
        for (pattern, replacement) in other.rules {
            if let Some(previous) = self.rules.insert(pattern.clone(), replacement) {
                debug!(pattern = %pattern, previous = %previous, "Rule overridden by later source");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, pattern: &str) -> Option<&str> {
        self.rules.get(pattern).map(String::as_str)
    }

    /// Rules in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }

    /// Ordering hazards in this rule set.
    ///
    /// An empty result means the outcome does not depend on rule order and
    /// re-applying the set to its own output changes nothing.
    pub fn conflicts(&self) -> Vec<RuleConflict> {
        let mut conflicts = Vec::new();
        for (pattern, _) in self.iter() {
            for (other_pattern, other_replacement) in self.iter() {
                if !other_replacement.contains(pattern) {
                    continue;
                }
                if pattern == other_pattern {
                    conflicts.push(RuleConflict::SelfOverlap {
                        pattern: pattern.to_string(),
                        replacement: other_replacement.to_string(),
                    });
                } else {
                    conflicts.push(RuleConflict::Chained {
                        pattern: pattern.to_string(),
                        produced_by: other_pattern.to_string(),
                    });
                }
            }
        }
        conflicts
    }
}

impl<P: Into<String>, R: Into<String>> FromIterator<(P, R)> for RuleSet {
    fn from_iter<I: IntoIterator<Item = (P, R)>>(iter: I) -> Self {
        let mut set = RuleSet::new();
        for (pattern, replacement) in iter {
            set.insert(pattern, replacement);
        }
        set
    }
}

/// A pair of rules whose combined effect depends on application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleConflict {
    /// `pattern` occurs in the replacement of the rule for `produced_by`.
    Chained { pattern: String, produced_by: String },
    /// `pattern` occurs in its own replacement; re-application grows the text.
    SelfOverlap { pattern: String, replacement: String },
}

impl fmt::Display for RuleConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleConflict::Chained {
                pattern,
                produced_by,
            } => write!(
                f,
                "pattern '{}' matches the replacement of rule '{}'",
                pattern, produced_by
            ),
            RuleConflict::SelfOverlap {
                pattern,
                replacement,
            } => write!(
                f,
                "pattern '{}' occurs in its own replacement '{}'",
                pattern, replacement
            ),
        }
    }
}

/// Apply `rules` to `resource` and return the substituted copy.
pub fn apply(resource: &Resource, rules: &RuleSet) -> Result<Resource, SubstitutionError> {
    let kind = resource.kind().to_string();
    let fence_identity = resource.is_pod();

    let mut text =
        serde_json::to_string(resource).map_err(|source| SubstitutionError::Serialize {
            kind: kind.clone(),
            source,
        })?;

    let original_name = if fence_identity {
        extract_name(&text)
    } else {
        String::new()
    };

    for (pattern, replacement) in rules.iter() {
        if text.contains(pattern) {
            text = text.replace(pattern, replacement);
        }
    }

    if fence_identity && !original_name.is_empty() {
        let mut restored = parse_resource(&text, &kind)?;
        if restored.name() != original_name && !restored.set_name(&original_name) {
            return Err(SubstitutionError::IdentityLost {
                name: original_name,
            });
        }
        text = serde_json::to_string(&restored).map_err(|source| SubstitutionError::Serialize {
            kind: kind.clone(),
            source,
        })?;
    }

    parse_resource(&text, &kind)
}

/// Read `metadata.name` back out of serialized text. Empty on any failure.
fn extract_name(text: &str) -> String {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => value
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Err(e) => {
            warn!("Could not extract Pod name before substitution: {}", e);
            String::new()
        }
    }
}

fn parse_resource(text: &str, kind: &str) -> Result<Resource, SubstitutionError> {
    let value: Value =
        serde_json::from_str(text).map_err(|source| SubstitutionError::Deserialize {
            kind: kind.to_string(),
            source,
        })?;
    Resource::from_value(value).ok_or_else(|| SubstitutionError::NotAnObject {
        kind: kind.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn resource(value: Value) -> Resource {
        Resource::from_value(value).unwrap()
    }

    fn web_pod() -> Resource {
        resource(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "web-7",
                "namespace": "shop",
                "labels": {"app": "web-7-demo"}
            },
            "spec": {"hostname": "web-7"}
        }))
    }

    #[test]
    fn test_pod_name_is_fenced() {
        let rules: RuleSet = [("web-7", "db-7")].into_iter().collect();
        let out = apply(&web_pod(), &rules).unwrap();

        assert_eq!(out.name(), "web-7");
        assert_eq!(out.labels().unwrap()["app"], "db-7-demo");
        assert_eq!(out.as_map()["spec"]["hostname"], "db-7");
    }

    #[test]
    fn test_non_pod_has_no_exemption() {
        let cm = resource(json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "staging-bucket"},
            "data": {"bucket": "s3://staging-bucket/backups"}
        }));
        let rules: RuleSet = [("staging-bucket", "prod-bucket")].into_iter().collect();
        let out = apply(&cm, &rules).unwrap();

        assert_eq!(out.name(), "prod-bucket");
        assert_eq!(out.as_map()["data"]["bucket"], "s3://prod-bucket/backups");
    }

    #[test]
    fn test_empty_rules_is_identity() {
        let pod = web_pod();
        assert_eq!(apply(&pod, &RuleSet::new()).unwrap(), pod);
    }

    #[test]
    fn test_replacement_equal_to_pod_name() {
        let rules: RuleSet = [("demo", "web-7")].into_iter().collect();
        let out = apply(&web_pod(), &rules).unwrap();
        assert_eq!(out.name(), "web-7");
        assert_eq!(out.labels().unwrap()["app"], "web-7-web-7");
    }

    #[test]
    fn test_chained_rules_apply_in_pattern_order() {
        // "alpha" runs before "beta", so the beta introduced by alpha is rewritten too.
        let cm = resource(json!({"kind": "ConfigMap", "data": {"k": "alpha"}}));
        let rules: RuleSet = [("alpha", "beta"), ("beta", "gamma")].into_iter().collect();
        let out = apply(&cm, &rules).unwrap();
        assert_eq!(out.as_map()["data"]["k"], "gamma");
    }

    #[test]
    fn test_rule_breaking_syntax_is_fatal() {
        let cm = resource(json!({"kind": "ConfigMap", "data": {"k": "v"}}));
        let rules: RuleSet = [("\"k\"", "k")].into_iter().collect();
        let err = apply(&cm, &rules).unwrap_err();
        assert!(matches!(err, SubstitutionError::Deserialize { .. }));
    }

    #[test]
    fn test_rule_producing_non_object_is_fatal() {
        let cm = resource(json!({"kind": "ConfigMap"}));
        let rules: RuleSet = [("{\"kind\":\"ConfigMap\"}", "[1]")].into_iter().collect();
        let err = apply(&cm, &rules).unwrap_err();
        assert!(matches!(err, SubstitutionError::NotAnObject { .. }));
    }

    #[test]
    fn test_pod_losing_metadata_is_fatal() {
        let rules: RuleSet = [("metadata", "meta")].into_iter().collect();
        let err = apply(&web_pod(), &rules).unwrap_err();
        assert!(matches!(err, SubstitutionError::IdentityLost { ref name } if name == "web-7"));
    }

    #[test]
    fn test_pod_without_name_skips_fence() {
        let pod = resource(json!({"kind": "Pod", "metadata": {"labels": {"a": "x"}}}));
        let rules: RuleSet = [("x", "y")].into_iter().collect();
        let out = apply(&pod, &rules).unwrap();
        assert_eq!(out.name(), "");
        assert_eq!(out.labels().unwrap()["a"], "y");
    }

    #[test]
    fn test_kind_rewritten_away_from_pod_still_fenced() {
        // The fence follows the kind observed before substitution.
        let rules: RuleSet = [("Pod", "Deployment"), ("web", "api")].into_iter().collect();
        let out = apply(&web_pod(), &rules).unwrap();
        assert_eq!(out.kind(), "Deployment");
        assert_eq!(out.name(), "web-7");
    }

    #[test]
    fn test_empty_pattern_dropped() {
        let rules: RuleSet = [("", "x"), ("a", "b")].into_iter().collect();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get("a"), Some("b"));
    }

    #[test]
    fn test_merge_last_write_wins() {
        let mut first: RuleSet = [("a", "1"), ("b", "2")].into_iter().collect();
        let second: RuleSet = [("b", "3")].into_iter().collect();
        first.merge(second);
        assert_eq!(first.get("a"), Some("1"));
        assert_eq!(first.get("b"), Some("3"));
    }

    #[test]
    fn test_conflicts() {
        let clean: RuleSet = [("staging", "prod"), ("east", "west")].into_iter().collect();
        assert!(clean.conflicts().is_empty());

        let chained: RuleSet = [("alpha", "beta"), ("beta", "gamma")].into_iter().collect();
        assert_eq!(
            chained.conflicts(),
            vec![RuleConflict::Chained {
                pattern: "beta".to_string(),
                produced_by: "alpha".to_string(),
            }]
        );

        let growing: RuleSet = [("web", "web-prod")].into_iter().collect();
        let conflicts = growing.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert!(matches!(conflicts[0], RuleConflict::SelfOverlap { .. }));
        assert!(conflicts[0].to_string().contains("its own replacement"));
    }

    #[test]
    fn test_conflict_free_rules_are_idempotent() {
        let rules: RuleSet = [("web-7", "db-7"), ("shop", "store")].into_iter().collect();
        assert!(rules.conflicts().is_empty());
        let once = apply(&web_pod(), &rules).unwrap();
        let twice = apply(&once, &rules).unwrap();
        assert_eq!(once, twice);
    }

    proptest! {
        // Names and patterns avoid the letters used by the JSON keys so that
        // rules only ever touch values.
        #[test]
        fn prop_pod_name_survives_any_rule(
            name in "[u-z][u-z0-9-]{0,15}",
            pattern in "[u-z0-9-]{1,6}",
            replacement in "[a-z0-9-]{0,8}",
        ) {
            let pod = resource(json!({
                "kind": "Pod",
                "metadata": {"name": name.clone(), "labels": {"app": format!("{name}-app")}}
            }));
            let mut rules = RuleSet::new();
            rules.insert(pattern.clone(), replacement);
            rules.insert(name.clone(), "renamed");

            let out = apply(&pod, &rules).unwrap();
            prop_assert_eq!(out.name(), name.as_str());
        }

        #[test]
        fn prop_non_pod_values_fully_substituted(
            value in "[u-z]{1,12}",
            pattern in "[u-z]{1,3}",
        ) {
            let cm = resource(json!({"kind": "Secret", "metadata": {"name": value.clone()}}));
            let mut rules = RuleSet::new();
            rules.insert(pattern.clone(), "0");

            let out = apply(&cm, &rules).unwrap();
            prop_assert_eq!(out.name(), value.replace(&pattern, "0"));
        }
    }
}
