//! Application context — unified state passed to every command handler.
//!
//! Built once in `Cli::run()` from the global flags, so command signatures
//! stay unchanged when a cross-cutting concern is added.

use std::path::PathBuf;

use anyhow::Result;

use crate::domain::ProvisionConfig;
use crate::infra::config::YamlConfigLoader;
use crate::infra::store::JsonServerStore;
use crate::output::{HumanRenderer, OutputContext};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    pub output: OutputFlags,
    /// Explicit config file (`--config`).
    pub config: Option<PathBuf>,
    /// Explicit store file (`--store`).
    pub store: Option<PathBuf>,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Effective provisioning configuration.
    pub config: ProvisionConfig,
    /// Where `config` was read from (may not exist).
    pub config_path: PathBuf,
    /// Owner and server records.
    pub store: JsonServerStore,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded or a default path
    /// needs the home directory and it cannot be determined.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let loader = YamlConfigLoader::resolve(flags.config.as_deref())?;
        let config = loader.load()?;
        let store = match &flags.store {
            Some(path) => JsonServerStore::with_path(path.clone()),
            None => JsonServerStore::new()?,
        };

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            config,
            config_path: loader.path().to_path_buf(),
            store,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    #[must_use]
    pub fn human(&self) -> HumanRenderer<'_> {
        HumanRenderer::new(&self.output)
    }
}
