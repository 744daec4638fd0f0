use std::path::PathBuf;

use common::{ConfigError, Settings};

/// Shared context handed to every CLI operation.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    /// Explicit `--config` path; `None` falls back to the default location.
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    /// Load and validate the configuration this invocation runs against. A
    /// missing file (fresh install) yields the defaults.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        match self.config_path.clone().or_else(Settings::default_path) {
            Some(path) => Settings::load(&path),
            None => {
                let settings = Settings::default();
                settings.validate()?;
                Ok(settings)
            }
        }
    }
}

/// One CLI operation: structured output, typed error, async execution.
#[async_trait::async_trait]
pub trait Op {
    type Error: std::error::Error + Send + Sync + 'static;
    type Output: std::fmt::Display;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}
