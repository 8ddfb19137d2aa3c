//! Loads `ProvisionConfig` from YAML with environment overrides.
//!
//! Path resolution: explicit path (`--config`), else `GANTRY_CONFIG`, else
//! `~/.gantry/config.yaml`. A missing file yields defaults. Secrets and
//! endpoints can then be overridden with `GANTRY_*` variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::ProvisionConfig;

/// Environment overrides, read with `envy` under the `GANTRY_` prefix.
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    ssh_key_path: Option<PathBuf>,
    ssh_key_passphrase: Option<String>,
    provider_api_url: Option<String>,
}

impl EnvOverrides {
    fn apply(self, config: &mut ProvisionConfig) {
        if let Some(path) = self.ssh_key_path {
            config.ssh.private_key_path = path;
        }
        if let Some(passphrase) = self.ssh_key_passphrase {
            config.ssh.private_key_passphrase = Some(passphrase);
        }
        if let Some(url) = self.provider_api_url {
            config.provider.api_url = url;
        }
    }
}

/// Reads the provisioning config from disk and the environment.
pub struct YamlConfigLoader {
    path: PathBuf,
}

impl YamlConfigLoader {
    /// Resolve the config path, preferring `explicit` over the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no explicit path or `GANTRY_CONFIG` is given and
    /// the home directory cannot be determined.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::with_path(path.to_path_buf()));
        }
        if let Ok(val) = std::env::var("GANTRY_CONFIG") {
            return Ok(Self::with_path(PathBuf::from(val)));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::with_path(home.join(".gantry").join("config.yaml")))
    }

    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if an override variable is malformed.
    pub fn load(&self) -> Result<ProvisionConfig> {
        let mut config = if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)
                .with_context(|| format!("cannot read {}", self.path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("cannot parse {}", self.path.display()))?
        } else {
            ProvisionConfig::default()
        };
        let overrides: EnvOverrides = envy::prefixed("GANTRY_")
            .from_env()
            .context("failed to read GANTRY_* overrides")?;
        overrides.apply(&mut config);
        Ok(config)
    }
}
