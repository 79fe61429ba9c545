use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::OnceCell;
use pipe_executor::{PipeCatalog, TransformPort};

use crate::config::AppConfig;
use crate::llm::transform_from_config;
use crate::session::{load_catalog, Session};

pub struct CliContext {
    config: Arc<AppConfig>,
    config_path: PathBuf,
    transform: OnceCell<Arc<dyn TransformPort>>,
}

impl CliContext {
    pub fn new(config: AppConfig, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            transform: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn transform(&self) -> Arc<dyn TransformPort> {
        Arc::clone(
            self.transform
                .get_or_init(|| transform_from_config(&self.config.llm)),
        )
    }

    pub fn catalog(&self) -> Result<PipeCatalog> {
        load_catalog(&self.config)
    }

    pub async fn session(&self) -> Result<Session> {
        Session::start(&self.config).await
    }
}
