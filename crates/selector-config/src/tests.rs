use std::env;
use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;

use crate::api::SelectorConfigStore;
use crate::defaults::{default_remote_config, GENERIC_INPUT_SELECTORS};
use crate::errors::ConfigError;
use crate::loader::{load_document, parse_document, ConfigSource, ENV_OVERRIDE_JSON};
use crate::model::{ConfigResolution, Strategy};

const DOC: &str = r##"{
  "version": "3.0.0",
  "lastUpdated": "2025-01-02T03:04:05Z",
  "global_killswitch": false,
  "platforms": {
    "acme": {
      "host": ["chat.acme.dev"],
      "input": { "selectors": ["#prompt", "textarea"], "strategy": "waterfall" },
      "submit": { "selectors": ["button.go"] }
    }
  }
}"##;

#[test]
fn builtin_document_is_valid() {
    let doc = default_remote_config();
    doc.validate().unwrap();
    assert_eq!(doc.version, "2.1.4");
    assert!(!doc.global_killswitch);
    assert_eq!(doc.platforms.len(), 2);
}

#[test]
fn resolves_platform_by_host_substring() {
    let store = SelectorConfigStore::builtin();
    match store.resolve_config("https://chat.deepseek.com/a/chat/s/123") {
        ConfigResolution::Platform(config) => {
            assert_eq!(config.platform, "deepseek");
            assert_eq!(config.input_selectors[0], "#chat-input");
            assert_eq!(config.strategy, Strategy::Waterfall);
        }
        other => panic!("unexpected resolution: {other:?}"),
    }
}

#[test]
fn overlapping_hosts_resolve_to_first_declared_platform() {
    let raw = r##"{
  "version": "4.0.0",
  "platforms": {
    "zeta": {
      "host": ["chat.acme.dev"],
      "input": { "selectors": ["#zeta"] }
    },
    "alpha": {
      "host": ["acme.dev"],
      "input": { "selectors": ["#alpha"] }
    }
  }
}"##;
    let document = parse_document(raw).unwrap();
    let names: Vec<&str> = document.platforms.keys().map(String::as_str).collect();
    assert_eq!(names, ["zeta", "alpha"]);

    let store = SelectorConfigStore::new(document, ConfigSource::Builtin).unwrap();
    match store.resolve_config("https://chat.acme.dev/new") {
        ConfigResolution::Platform(config) => assert_eq!(config.platform, "zeta"),
        other => panic!("unexpected resolution: {other:?}"),
    }
}

#[test]
fn unknown_host_falls_back_to_generic_list() {
    let store = SelectorConfigStore::builtin();
    assert_eq!(
        store.resolve_config("https://example.org/"),
        ConfigResolution::Unmatched
    );
    let effective = store.effective_selectors("https://example.org/").unwrap();
    assert!(effective.is_fallback());
    assert_eq!(effective.input, GENERIC_INPUT_SELECTORS);
}

#[test]
fn killswitch_is_distinct_from_absence() {
    let mut doc = default_remote_config();
    doc.global_killswitch = true;
    let store = SelectorConfigStore::new(doc, ConfigSource::Builtin).unwrap();

    // Even a matching host is refused.
    assert!(matches!(
        store.resolve_config("https://chat.kimi.ai/"),
        ConfigResolution::Disabled { .. }
    ));
    let err = store
        .effective_selectors("https://chat.kimi.ai/")
        .unwrap_err();
    assert!(err.is_disabled());
    let err = store.effective_selectors("https://example.org/").unwrap_err();
    assert!(err.is_disabled());
}

#[test]
fn parse_accepts_wire_document() {
    let doc = parse_document(DOC).unwrap();
    assert_eq!(doc.version, "3.0.0");
    assert!(doc.last_updated.is_some());
    let compiled = doc.compile();
    assert_eq!(compiled[0].submit_selectors, vec!["button.go"]);
}

#[test]
fn parse_rejects_empty_input_selectors() {
    let raw = r#"{"version":"1","global_killswitch":false,"platforms":{"bad":{"host":["bad.dev"],"input":{"selectors":[]}}}}"#;
    assert!(matches!(
        parse_document(raw),
        Err(ConfigError::EmptyInputSelectors(key)) if key == "bad"
    ));
}

#[tokio::test]
async fn replace_swaps_and_notifies_subscribers() {
    let store = SelectorConfigStore::builtin();
    let mut rx = store.subscribe();
    let original_rev = rx.borrow().rev;

    let mut doc = default_remote_config();
    doc.global_killswitch = true;
    let rev = store.replace(doc).unwrap();

    rx.changed().await.unwrap();
    let snapshot = Arc::clone(&rx.borrow());
    assert_ne!(snapshot.rev, original_rev);
    assert_eq!(snapshot.rev, rev);
    assert!(snapshot.document.global_killswitch);
    assert!(store.effective_selectors("https://chat.kimi.ai").is_err());
}

#[test]
fn invalid_replace_keeps_previous_snapshot() {
    let store = SelectorConfigStore::builtin();
    let before = store.snapshot().rev;
    let mut doc = default_remote_config();
    if let Some(entry) = doc.platforms.get_mut("kimi") {
        entry.input.selectors.clear();
    }
    assert!(store.replace(doc).is_err());
    assert_eq!(store.snapshot().rev, before);
    assert!(matches!(
        store.resolve_config("https://chat.kimi.ai"),
        ConfigResolution::Platform(_)
    ));
}

#[test]
fn status_report_labels_fallback() {
    let store = SelectorConfigStore::builtin();
    let matched = store.status_report("https://chat.kimi.ai/chat");
    assert_eq!(matched.headline(), "Operational");
    assert_eq!(matched.strategy, "HEURISTIC");

    let fallback = store.status_report("https://example.org");
    assert_eq!(fallback.headline(), "Fallback Mode");
    assert_eq!(fallback.strategy, "VISUAL_GUESS");
    assert_eq!(fallback.version, "2.1.4");
}

#[tokio::test]
#[serial]
async fn reload_picks_up_file_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("selectors.json");
    std::fs::write(&path, DOC).unwrap();

    let store = SelectorConfigStore::load(ConfigSource::File(path.clone()))
        .await
        .unwrap();
    assert!(!store.reload().await.unwrap());

    std::fs::write(&path, DOC.replace("3.0.0", "3.0.1")).unwrap();
    assert!(store.reload().await.unwrap());
    assert_eq!(store.snapshot().document.version, "3.0.1");

    std::fs::write(&path, "version: [").unwrap();
    assert!(store.reload().await.is_err());
    assert_eq!(store.snapshot().document.version, "3.0.1");
}

#[tokio::test]
#[serial]
async fn env_override_replaces_source_document() {
    env::set_var(ENV_OVERRIDE_JSON, DOC);
    let loaded = load_document(&ConfigSource::Builtin).await;
    env::remove_var(ENV_OVERRIDE_JSON);
    assert_eq!(loaded.unwrap().version, "3.0.0");
}

#[tokio::test(start_paused = true)]
#[serial]
async fn zero_refresh_interval_keeps_running() {
    let store = Arc::new(SelectorConfigStore::builtin());
    let refresh = store.spawn_refresh(Duration::ZERO);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!refresh.is_finished());
    assert_eq!(store.snapshot().document.version, "2.1.4");
    refresh.abort();
}
