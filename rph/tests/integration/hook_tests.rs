use serde_json::{Value, json};

use crate::common::{TestEnv, assert_contains, assert_success, init_test_logging};

fn pod_request() -> Value {
    json!({
        "item": {
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "web-7",
                "namespace": "app",
                "labels": {
                    "app": "web-7-demo",
                    "velero.io/restore-name": "nightly",
                    "velero.io/restore-uid": "uid-1"
                }
            },
            "spec": {"hostname": "web-7"}
        }
    })
}

fn parse_stdout(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_hook_passes_through_without_cluster() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_passes_through_without_cluster");

    let env = TestEnv::new();
    let request = pod_request();
    let output = env.run(&["execute"], &request.to_string());

    assert_success(&output);
    let response = parse_stdout(&output);
    assert_eq!(response["updatedItem"], request["item"]);
    assert_eq!(response["additionalItems"], json!([]));
    assert_eq!(response["skipRestore"], false);

    crate::test_log!("TEST PASS: test_hook_passes_through_without_cluster");
}

#[test]
fn test_hook_defaults_to_execute() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_defaults_to_execute");

    let env = TestEnv::new();
    let output = env.run(&[], r#"{"item": {"kind": "Secret"}}"#);

    assert_success(&output);
    assert_eq!(parse_stdout(&output)["updatedItem"], json!({"kind": "Secret"}));

    crate::test_log!("TEST PASS: test_hook_defaults_to_execute");
}

#[test]
fn test_hook_applies_rules_file_and_keeps_pod_name() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_applies_rules_file_and_keeps_pod_name");

    let env = TestEnv::new();
    let rules = env.write_file("rules.json", r#"{"web-7": "db-7"}"#);
    let output = env.run(
        &["--rules", rules.to_str().unwrap(), "execute"],
        &pod_request().to_string(),
    );

    assert_success(&output);
    let item = &parse_stdout(&output)["updatedItem"];
    assert_eq!(item["metadata"]["name"], "web-7");
    assert_eq!(item["metadata"]["labels"]["app"], "db-7-demo");
    assert_eq!(item["spec"]["hostname"], "db-7");

    // No cluster, so advancing the volume restores is skipped with a warning.
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_contains(&stderr, "RPH-E400");

    crate::test_log!("TEST PASS: test_hook_applies_rules_file_and_keeps_pod_name");
}

#[test]
fn test_hook_substitutes_non_pod_name() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_substitutes_non_pod_name");

    let env = TestEnv::new();
    let rules = env.write_file("rules.toml", "\"staging-bucket\" = \"prod-bucket\"\n");
    let request = json!({
        "item": {
            "kind": "ConfigMap",
            "metadata": {"name": "staging-bucket"},
            "data": {"url": "s3://staging-bucket"}
        }
    });
    let mut cmd = env.command(&["execute"]);
    cmd.env("RPH_RULES_FILE", &rules);
    let output = env.run_command(cmd, &request.to_string());

    assert_success(&output);
    let item = &parse_stdout(&output)["updatedItem"];
    assert_eq!(item["metadata"]["name"], "prod-bucket");
    assert_eq!(item["data"]["url"], "s3://prod-bucket");

    crate::test_log!("TEST PASS: test_hook_substitutes_non_pod_name");
}

#[test]
fn test_hook_missing_rules_file_fails_open() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_missing_rules_file_fails_open");

    let env = TestEnv::new();
    let request = pod_request();
    let output = env.run(
        &["--rules", "/nonexistent/rules.json", "execute"],
        &request.to_string(),
    );

    assert_success(&output);
    assert_eq!(parse_stdout(&output)["updatedItem"], request["item"]);
    assert_contains(&String::from_utf8_lossy(&output.stderr), "RPH-E101");

    crate::test_log!("TEST PASS: test_hook_missing_rules_file_fails_open");
}

#[test]
fn test_hook_empty_input_no_output() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_empty_input_no_output");

    let env = TestEnv::new();
    let output = env.run(&["execute"], "");

    assert_success(&output);
    assert!(output.stdout.is_empty(), "Expected empty output");

    crate::test_log!("TEST PASS: test_hook_empty_input_no_output");
}

#[test]
fn test_hook_rejects_malformed_input() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_rejects_malformed_input");

    let env = TestEnv::new();
    let output = env.run(&["execute"], "{\"item\": ");

    assert!(!output.status.success(), "Expected failure on malformed input");
    assert!(output.stdout.is_empty());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "RPH-E500");

    crate::test_log!("TEST PASS: test_hook_rejects_malformed_input");
}

#[test]
fn test_hook_fails_when_rules_break_json() {
    init_test_logging();
    crate::test_log!("TEST START: test_hook_fails_when_rules_break_json");

    let env = TestEnv::new();
    let rules = env.write_file("rules.json", r#"{"\"kind\"": "kind"}"#);
    let output = env.run(
        &["--rules", rules.to_str().unwrap()],
        r#"{"item": {"kind": "ConfigMap"}}"#,
    );

    assert!(!output.status.success(), "Expected substitution failure");
    assert!(output.stdout.is_empty());
    assert_contains(&String::from_utf8_lossy(&output.stderr), "RPH-E201");

    crate::test_log!("TEST PASS: test_hook_fails_when_rules_break_json");
}
