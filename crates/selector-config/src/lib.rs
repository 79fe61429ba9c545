//! Per-site selector configuration with fail-closed killswitch and hot reload.

pub mod api;
pub mod defaults;
pub mod errors;
pub mod loader;
pub mod model;

pub use api::{ConfigSnapshot, SelectorConfigStore, MIN_REFRESH_INTERVAL};
pub use defaults::{default_remote_config, GENERIC_INPUT_SELECTORS, GENERIC_SUBMIT_SELECTORS};
pub use errors::ConfigError;
pub use loader::{load_document, parse_document, ConfigSource};
pub use model::{
    ConfigResolution, EffectiveSelectors, RemoteConfig, SelectorConfig, StatusReport, Strategy,
};

#[cfg(test)]
mod tests;
