use serde_json::{Value, json};

use crate::common::{TestEnv, assert_contains, assert_success, init_test_logging};

#[test]
fn test_applies_to_selects_everything() {
    init_test_logging();
    crate::test_log!("TEST START: test_applies_to_selects_everything");

    let env = TestEnv::new();
    let output = env.run(&["applies-to"], "");

    assert_success(&output);
    let selector: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        selector,
        json!({
            "includedNamespaces": [],
            "excludedNamespaces": [],
            "includedResources": [],
            "excludedResources": [],
            "labelSelector": ""
        })
    );

    crate::test_log!("TEST PASS: test_applies_to_selects_everything");
}

#[test]
fn test_rules_prints_rule_set() {
    init_test_logging();
    crate::test_log!("TEST START: test_rules_prints_rule_set");

    let env = TestEnv::new();
    let rules = env.write_file("rules.json", r#"{"east": "west", "staging": "prod"}"#);
    let output = env.run(&["--rules", rules.to_str().unwrap(), "rules", "--check"], "");

    assert_success(&output);
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["rules"], json!({"east": "west", "staging": "prod"}));
    assert_eq!(report["conflicts"], json!([]));
    assert_eq!(
        report["selector"],
        "agoracalyce.io/replace-pattern=RestoreItemAction"
    );

    crate::test_log!("TEST PASS: test_rules_prints_rule_set");
}

#[test]
fn test_rules_check_fails_on_overlap() {
    init_test_logging();
    crate::test_log!("TEST START: test_rules_check_fails_on_overlap");

    let env = TestEnv::new();
    let rules = env.write_file("rules.json", r#"{"a-1": "b-1", "b-1": "c-1"}"#);

    let lenient = env.run(&["--rules", rules.to_str().unwrap(), "rules"], "");
    assert_success(&lenient);

    let strict = env.run(&["--rules", rules.to_str().unwrap(), "rules", "--check"], "");
    assert!(!strict.status.success(), "Expected --check to fail");
    let report: Value = serde_json::from_slice(&strict.stdout).unwrap();
    assert_eq!(report["conflicts"].as_array().unwrap().len(), 1);
    assert_contains(&String::from_utf8_lossy(&strict.stderr), "overlapping");

    crate::test_log!("TEST PASS: test_rules_check_fails_on_overlap");
}

#[test]
fn test_rules_without_cluster_fails() {
    init_test_logging();
    crate::test_log!("TEST START: test_rules_without_cluster_fails");

    let env = TestEnv::new();
    let output = env.run(&["rules"], "");

    assert!(!output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "RPH-E400");

    crate::test_log!("TEST PASS: test_rules_without_cluster_fails");
}

#[test]
fn test_config_reports_sources() {
    init_test_logging();
    crate::test_log!("TEST START: test_config_reports_sources");

    let env = TestEnv::new();
    let config = env.write_file("rph.toml", "[rules]\nstrict = true\n");
    let mut cmd = env.command(&["--config", config.to_str().unwrap(), "config", "--json"]);
    cmd.env("RPH_NAMESPACE", "backup-system");
    let output = env.run_command(cmd, "");

    assert_success(&output);
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["config"]["correlation"]["operator_namespace"], "backup-system");
    assert_eq!(report["config"]["rules"]["strict"], true);

    let sources = report["sources"].as_array().unwrap();
    let find = |key: &str| {
        sources
            .iter()
            .find(|s| s["key"] == key)
            .unwrap_or_else(|| panic!("no source entry for {key}"))
            .clone()
    };
    assert_eq!(find("correlation.operator_namespace")["source"], "environment");
    assert_eq!(find("correlation.operator_namespace")["origin"], "RPH_NAMESPACE");
    assert_eq!(find("rules.strict")["source"], "file");
    assert_eq!(find("rules.selector")["source"], "default");

    crate::test_log!("TEST PASS: test_config_reports_sources");
}

#[test]
fn test_invalid_env_is_reported() {
    init_test_logging();
    crate::test_log!("TEST START: test_invalid_env_is_reported");

    let env = TestEnv::new();
    let mut cmd = env.command(&["config"]);
    cmd.env("RPH_STRICT_RULES", "sometimes");
    let output = env.run_command(cmd, "");

    assert!(!output.status.success());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "RPH_STRICT_RULES");

    crate::test_log!("TEST PASS: test_invalid_env_is_reported");
}

#[test]
fn test_zero_timeout_in_file_is_reported() {
    init_test_logging();
    crate::test_log!("TEST START: test_zero_timeout_in_file_is_reported");

    let env = TestEnv::new();
    let config = env.write_file("rph.toml", "[cluster]\ntimeout_secs = 0\n");
    let output = env.run(&["--config", config.to_str().unwrap(), "config"], "");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "RPH-E004");
    assert_contains(&stderr, "cluster.timeout_secs");

    crate::test_log!("TEST PASS: test_zero_timeout_in_file_is_reported");
}

#[test]
fn test_explain_error_code() {
    init_test_logging();
    crate::test_log!("TEST START: test_explain_error_code");

    let env = TestEnv::new();
    let output = env.run(&["explain", "RPH-E102"], "");

    assert_success(&output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_contains(&stdout, "[RPH-E102] Substitution rules overlap");
    assert_contains(&stdout, "Remediation steps:");

    let unknown = env.run(&["explain", "RPH-E999"], "");
    assert!(!unknown.status.success());

    crate::test_log!("TEST PASS: test_explain_error_code");
}
