//! `gantry config` — print the effective configuration.

use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::app::AppContext;
use crate::output::{Tone, json};

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    if app.is_json() {
        json::print(&serde_json::json!({
            "path": app.config_path,
            "config": app.config,
        }))?;
        return Ok(ExitCode::SUCCESS);
    }
    let yaml = serde_yaml::to_string(&app.config).context("cannot serialize config")?;
    app.output.emit(
        Tone::Note,
        &format!("Config file: {}", app.config_path.display()),
    );
    print!("{yaml}");
    Ok(ExitCode::SUCCESS)
}
