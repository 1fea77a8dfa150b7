//! Basic CLI E2E tests.
//!
//! Each test drives the built binary against its own temporary data directory.

use std::io::Write;
use std::process::{Command, Stdio};

use chrono::{Duration, Local};
use tempfile::TempDir;

struct Cli {
    home: TempDir,
}

impl Cli {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("temp dir"),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_panictutor"));
        cmd.args(args)
            .env("PANICTUTOR_HOME", self.home.path())
            .env_remove("PANICTUTOR_LOG");
        cmd
    }

    /// Run and return (stdout, stderr, exit code).
    fn run(&self, args: &[&str]) -> (String, String, i32) {
        self.run_with_stdin(args, "")
    }

    fn run_with_stdin(&self, args: &[&str], stdin: &str) -> (String, String, i32) {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn panictutor");
        child
            .stdin
            .take()
            .expect("stdin")
            .write_all(stdin.as_bytes())
            .expect("write stdin");
        let output = child.wait_with_output().expect("wait for panictutor");
        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code().unwrap_or(-1),
        )
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "{args:?} failed: {stderr}");
        serde_json::from_str(&stdout).expect("JSON on stdout")
    }
}

fn date_in(days: i64) -> String {
    (Local::now().date_naive() + Duration::days(days))
        .format("%Y/%m/%d")
        .to_string()
}

#[test]
fn config_get_set_and_path() {
    let cli = Cli::new();
    let (stdout, _, code) = cli.run(&["config", "get", "monitor.check_interval_min"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "30");

    let (_, _, code) = cli.run(&["config", "set", "monitor.check_interval_min", "45"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = cli.run(&["config", "get", "monitor.check_interval_min"]);
    assert_eq!(stdout.trim(), "45");

    let (_, stderr, code) = cli.run(&["config", "set", "monitor.nope", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let (stdout, _, _) = cli.run(&["config", "path"]);
    assert!(stdout.trim().ends_with("config.toml"));
}

#[test]
fn schedule_add_list_and_locked_delete() {
    let cli = Cli::new();
    let date = date_in(3);
    let entry = cli.json(&["schedule", "add", &date, "Math", "", "Art"]);
    assert_eq!(entry["periods"][0]["subject"], "Math");
    assert_eq!(entry["periods"][1]["subject"], "");

    let view = cli.json(&["schedule", "list"]);
    assert_eq!(view["upcoming"].as_array().map(Vec::len), Some(1));

    let (_, stderr, code) = cli.run(&["schedule", "delete", &date]);
    assert_eq!(code, 1);
    assert!(stderr.contains("cannot delete"), "{stderr}");

    let deleted = cli.json(&["schedule", "delete", &date, "--force"]);
    assert_eq!(deleted["deleted"], date.as_str());
}

#[test]
fn monitor_once_escalates_then_skip_clears() {
    let cli = Cli::new();
    let date = date_in(2);
    cli.json(&["schedule", "add", &date, "Chemistry"]);

    let outcome = cli.json(&["monitor", "once"]);
    assert_eq!(outcome["outcome"], "escalated");
    assert_eq!(outcome["payload"]["kind"], "threat");

    let history = cli.json(&["notifications", "history"]);
    assert_eq!(history.as_array().map(Vec::len), Some(1));

    let (stdout, stderr, code) = cli.run_with_stdin(&["study", "mark", "1"], ":skip\n");
    assert_eq!(code, 0, "{stderr}");
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["outcomes"][0]["skipped"], true);

    let status = cli.json(&["status"]);
    assert_eq!(status["compliance"]["global_clear"], true);
    assert_eq!(cli.json(&["monitor", "once"])["outcome"], "clear");
}

#[test]
fn auth_key_lifecycle() {
    let cli = Cli::new();
    assert_eq!(cli.json(&["auth", "status"])["configured"], false);

    let (_, _, code) = cli.run(&["auth", "set-key", "abc123"]);
    assert_eq!(code, 0);
    let status = cli.json(&["auth", "status"]);
    assert_eq!(status["configured"], true);
    assert_eq!(status["backend"], "kv");

    cli.run(&["auth", "clear"]);
    assert_eq!(cli.json(&["auth", "status"])["configured"], false);
}

#[test]
fn reset_requires_confirmation() {
    let cli = Cli::new();
    cli.json(&["schedule", "add", &date_in(20), "History"]);

    let (_, stderr, code) = cli.run(&["reset"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("--yes"));

    cli.json(&["reset", "--yes"]);
    let view = cli.json(&["schedule", "list"]);
    assert_eq!(view["upcoming"].as_array().map(Vec::len), Some(0));
}
