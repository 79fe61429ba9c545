use chrono::Utc;
use indexmap::IndexMap;

use crate::model::{InputSection, PlatformEntry, RemoteConfig, Strategy, SubmitSection};

/// Best-effort input selectors for pages no platform claims.
pub const GENERIC_INPUT_SELECTORS: &[&str] = &[
    "#chat-input",
    "textarea[placeholder*='Message']",
    "div[contenteditable='true']",
    ".input-editor",
    "textarea",
];

pub const GENERIC_SUBMIT_SELECTORS: &[&str] =
    &["button[type='submit']", "button[aria-label='Send']"];

pub fn generic_input_selectors() -> Vec<String> {
    GENERIC_INPUT_SELECTORS.iter().map(|s| s.to_string()).collect()
}

pub fn generic_submit_selectors() -> Vec<String> {
    GENERIC_SUBMIT_SELECTORS.iter().map(|s| s.to_string()).collect()
}

/// Config shipped with the binary, used until a remote document is loaded.
pub fn default_remote_config() -> RemoteConfig {
    let mut platforms = IndexMap::new();
    platforms.insert(
        "deepseek".to_string(),
        PlatformEntry {
            host: vec!["chat.deepseek.com".into()],
            input: InputSection {
                selectors: vec![
                    "#chat-input".into(),
                    "textarea[placeholder*='Message']".into(),
                    "//textarea[@class='dynamic-input']".into(),
                ],
                strategy: Strategy::Waterfall,
            },
            submit: SubmitSection {
                selectors: vec!["div[role='button'][aria-label='Send']".into()],
            },
        },
    );
    platforms.insert(
        "kimi".to_string(),
        PlatformEntry {
            host: vec!["chat.kimi.ai".into()],
            input: InputSection {
                selectors: vec![".input-editor".into(), "div[contenteditable='true']".into()],
                strategy: Strategy::Heuristic,
            },
            submit: SubmitSection {
                selectors: vec!["button.send-btn".into()],
            },
        },
    );

    RemoteConfig {
        version: "2.1.4".into(),
        last_updated: Some(Utc::now()),
        global_killswitch: false,
        platforms,
    }
}
