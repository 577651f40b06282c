//! Integration tests for the toolbridge binary

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// Run the binary inside `dir` with logs and journals kept there
fn toolbridge(dir: &Path, args: &[&str], stdin: Option<&str>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_toolbridge"))
        .args(["--config-file", "config.toml"])
        .args(args)
        .current_dir(dir)
        .env("TOOLBRIDGE_LOG_FILE_PATH", dir.join("logs/test.log"))
        .env("TOOLBRIDGE_JOURNAL_DIR", dir.join("journal"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start toolbridge");

    {
        let mut input = child.stdin.take().expect("stdin is piped");
        if let Some(text) = stdin {
            input
                .write_all(text.as_bytes())
                .expect("Failed to write console input");
        }
    }

    child.wait_with_output().expect("Failed to wait for toolbridge")
}

/// Test that the help command works
#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    let output = toolbridge(dir.path(), &["--help"], None);

    assert!(output.status.success(), "Help command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: toolbridge"), "Should show usage");
    assert!(stdout.contains("config"), "Should show config command");
    assert!(stdout.contains("--json"), "Should show json flag");
    assert!(stdout.contains("--user"), "Should show user flag");
}

/// Test that the version command works
#[test]
fn test_version_command() {
    let dir = TempDir::new().unwrap();
    let output = toolbridge(dir.path(), &["--version"], None);

    assert!(output.status.success(), "Version command should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("toolbridge"), "Should show binary name");
    assert!(stdout.contains("0.1.0"), "Should show version number");
}

/// Test config reset followed by config show
#[test]
fn test_config_reset_and_show() {
    let dir = TempDir::new().unwrap();

    let output = toolbridge(dir.path(), &["config", "reset"], None);
    assert!(output.status.success(), "Config reset should succeed");
    assert!(dir.path().join("config.toml").exists());

    let output = toolbridge(dir.path(), &["config", "show"], None);
    assert!(output.status.success(), "Config show should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Current configuration:"));
    assert!(stdout.contains("[tool]"), "Should show tool section");
    assert!(stdout.contains("flush_idle_ms"), "Should show flush threshold");
    assert!(stdout.contains("prompt_keywords"), "Should show keywords");
}

/// Test dry-run prints the configuration summary and exits
#[test]
fn test_dry_run() {
    let dir = TempDir::new().unwrap();
    let output = toolbridge(dir.path(), &["--dry-run"], None);

    assert!(output.status.success(), "Dry run should succeed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Dry-run mode configuration:"));
    assert!(stdout.contains("Flush after: 5000ms idle"));
}

/// Test the console in JSON mode answers commands and quits cleanly
#[test]
fn test_json_console_session() {
    let dir = TempDir::new().unwrap();
    let output = toolbridge(
        dir.path(),
        &["--json", "--user", "7"],
        Some("/whoami\n/bogus\n/status\n/quit\n"),
    );

    assert!(output.status.success(), "Console should exit cleanly");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("every stdout line is JSON"))
        .collect();

    assert!(lines
        .iter()
        .any(|l| l["console"] == "info" && l["text"] == "Acting as user 7"));
    assert!(lines.iter().any(|l| l["console"] == "error"
        && l["text"].as_str().unwrap_or_default().starts_with("Unknown command: /bogus")));

    let status = lines
        .iter()
        .find(|l| l["chat_id"] == 7)
        .expect("status reply for user 7");
    assert!(status["text"]
        .as_str()
        .unwrap()
        .starts_with("Status:\n- Running: no"));
    assert_eq!(status["markup"]["kind"], "controls");
}

/// Test end of console input shuts down like /quit
#[test]
fn test_console_exits_on_end_of_input() {
    let dir = TempDir::new().unwrap();
    let output = toolbridge(dir.path(), &[], Some("/help\n"));

    assert!(output.status.success(), "Console should exit on EOF");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Toolbridge Commands:"));
    assert!(stdout.contains("/pick <code>"));
}
