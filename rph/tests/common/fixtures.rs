use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// Environment variables that would leak the developer's setup into a run.
const SCRUBBED_VARS: &[&str] = &[
    "RPH_CONFIG",
    "RPH_NAMESPACE",
    "RPH_RESTORE_NAME_LABEL",
    "RPH_RESTORE_UID_LABEL",
    "RPH_TARGET_PHASE",
    "RPH_RULE_SELECTOR",
    "RPH_STRICT_RULES",
    "RPH_RULES_FILE",
    "RPH_API_SERVER",
    "RPH_TIMEOUT_SECS",
    "RPH_LOG_LEVEL",
    "RPH_LOG_FORMAT",
    "RUST_LOG",
    "KUBERNETES_SERVICE_HOST",
    "KUBERNETES_SERVICE_PORT",
];

/// An isolated home directory with no config file and no cluster.
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        crate::test_log!("FIXTURE: Creating isolated rph environment");
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    /// `rph` with the given arguments, isolated from the host environment.
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_rph"));
        cmd.args(args)
            .env("HOME", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env("RPH_TOKEN_FILE", self.dir.path().join("no-token"))
            .env("RPH_CA_FILE", self.dir.path().join("no-ca.crt"));
        for var in SCRUBBED_VARS {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Run `rph` with `input` on stdin.
    pub fn run(&self, args: &[&str], input: &str) -> Output {
        self.run_command(self.command(args), input)
    }

    pub fn run_command(&self, mut cmd: Command, input: &str) -> Output {
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to start rph");
        {
            let stdin = child.stdin.as_mut().expect("Failed to open stdin");
            stdin
                .write_all(input.as_bytes())
                .expect("Failed to write hook input");
        }
        child.wait_with_output().expect("Failed to read rph output")
    }
}
