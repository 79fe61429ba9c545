use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

const FAST_CONFIG: &str = "\
bridge:
  runtime: auto
pipes:
  extract_ms: 1
  transform_ms: 1
  switch_ms: 1
  settle_ms: 50
";

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("synapse.yaml");
    std::fs::write(&path, body).expect("write config");
    path
}

fn synapse(dir: &Path, config: &Path) -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("synapse");
    let mut cmd = Command::new(bin);
    cmd.current_dir(dir)
        .env_remove("API_KEY")
        .env_remove("SYNAPSE_SELECTORS_JSON")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(config);
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn pipes_lists_the_builtin_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), FAST_CONFIG);
    let assert = synapse(dir.path(), &config)
        .args(["--output", "json", "pipes"])
        .assert()
        .success();
    let payload = stdout_json(assert.get_output());
    let ids: Vec<&str> = payload["pipes"]
        .as_array()
        .expect("pipes array")
        .iter()
        .filter_map(|pipe| pipe["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert_eq!(payload["pipes"][1]["isThinkingMode"], true);
}

#[test]
fn status_reports_operational_and_fallback_pages() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), FAST_CONFIG);

    let assert = synapse(dir.path(), &config)
        .args(["status", "https://chat.deepseek.com/a/chat"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("Engine: Operational"), "{stdout}");
    assert!(stdout.contains("Strategy: WATERFALL"), "{stdout}");
    assert!(stdout.contains("  - #chat-input"), "{stdout}");

    let assert = synapse(dir.path(), &config)
        .args(["--output", "json", "status", "https://example.org/"])
        .assert()
        .success();
    let payload = stdout_json(assert.get_output());
    assert_eq!(payload["operational"], false);
    assert_eq!(payload["strategy"], "VISUAL_GUESS");
    assert_eq!(payload["version"], "2.1.4");
}

#[test]
fn inject_writes_into_known_and_unknown_pages() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), FAST_CONFIG);

    let assert = synapse(dir.path(), &config)
        .args(["--output", "json", "inject", "https://chat.deepseek.com/", "hello"])
        .assert()
        .success();
    let payload = stdout_json(assert.get_output());
    assert_eq!(payload["inject"]["ok"], true);
    assert_eq!(payload["inject"]["selector"], "#chat-input");
    assert_eq!(payload["input_text"], "hello");

    let assert = synapse(dir.path(), &config)
        .args(["--output", "json", "inject", "https://example.org/notes", "draft"])
        .assert()
        .success();
    let payload = stdout_json(assert.get_output());
    assert_eq!(payload["inject"]["selector"], "textarea");
    assert_eq!(payload["input_text"], "draft");
}

#[test]
fn killswitch_blocks_injection() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), FAST_CONFIG);
    synapse(dir.path(), &config)
        .env(
            "SYNAPSE_SELECTORS_JSON",
            r#"{"version":"9.9.9","global_killswitch":true,"platforms":{}}"#,
        )
        .args(["inject", "https://chat.deepseek.com/", "hello"])
        .assert()
        .failure();
}

#[test]
fn template_pipe_streams_its_console() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), FAST_CONFIG);
    let assert = synapse(dir.path(), &config)
        .args(["run", "p1"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("[System] Initializing Pipe: Analyst Handover"), "{stdout}");
    assert!(stdout.contains("[Switch] Focusing tab: chat.deepseek.com"), "{stdout}");
    assert!(stdout.contains("Status: SUCCESS"), "{stdout}");
    assert!(stdout.contains("[PIPE OUTPUT from chat.kimi.ai]"), "{stdout}");
}

#[test]
fn thinking_pipe_without_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), FAST_CONFIG);
    let assert = synapse(dir.path(), &config)
        .args(["run", "p2"])
        .assert()
        .failure();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    assert!(stdout.contains("[Think] Routing to offline"), "{stdout}");
    assert!(stdout.contains("[Error] Pipe failed: API key missing"), "{stdout}");
}

#[test]
fn clip_without_key_returns_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), FAST_CONFIG);
    let assert = synapse(dir.path(), &config)
        .args(["--output", "json", "clip", "Quarterly revenue grew 12%"])
        .assert()
        .success();
    let payload = stdout_json(assert.get_output());
    assert_eq!(payload["title"], "No API Key");
    assert_eq!(payload["tags"][0], "error");
}

#[test]
fn config_validate_checks_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), FAST_CONFIG);
    synapse(dir.path(), &config)
        .args(["config", "validate"])
        .assert()
        .success();

    let broken = dir.path().join("broken.yaml");
    std::fs::write(&broken, "bridge:\n  runtime: carrier-pigeon\n").unwrap();
    synapse(dir.path(), &config)
        .args(["config", "validate"])
        .arg(&broken)
        .assert()
        .failure();
}
