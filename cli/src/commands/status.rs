//! `gantry status` — show a server's provisioning state.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use gantry_common::{ServerId, ServerStatus};

use crate::app::AppContext;
use crate::application::ports::ServerStore;
use crate::output::{Tone, json};

/// Log entries shown by default.
const RECENT_LOG_ENTRIES: usize = 10;

#[derive(Args)]
pub struct StatusArgs {
    /// Server id
    #[arg(long)]
    pub server: u64,

    /// Number of recent log entries to show
    #[arg(long, default_value_t = RECENT_LOG_ENTRIES)]
    pub log: usize,
}

/// Run the status command.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub async fn run(app: &AppContext, args: &StatusArgs) -> Result<ExitCode> {
    let id = ServerId(args.server);
    let Some(server) = app.store.load_server(id).await? else {
        if app.is_json() {
            println!(
                "{}",
                json::format_error(&format!("server {id} not found"), "SERVER_NOT_FOUND")?
            );
        } else {
            app.output.emit(Tone::Failed, &format!("server {id} not found"));
        }
        return Ok(ExitCode::FAILURE);
    };

    let status = ServerStatus::from_server(&server, args.log);
    if app.is_json() {
        json::print(&status)?;
    } else {
        app.human().render_status(&status);
    }
    Ok(ExitCode::SUCCESS)
}
