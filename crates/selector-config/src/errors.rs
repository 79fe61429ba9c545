use synapse_core_types::SynapseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("injection disabled by killswitch (config {0})")]
    Disabled(String),
    #[error("platform '{0}' declares no input selectors")]
    EmptyInputSelectors(String),
    #[error("platform '{0}' declares no host")]
    EmptyHosts(String),
    #[error("invalid selector config: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
}

impl ConfigError {
    /// Killswitch refusals are policy, not faults.
    pub fn is_disabled(&self) -> bool {
        matches!(self, ConfigError::Disabled(_))
    }
}

impl From<ConfigError> for SynapseError {
    fn from(value: ConfigError) -> Self {
        SynapseError::new(value.to_string())
    }
}
