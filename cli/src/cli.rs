//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, OutputFlags};
use crate::commands;

/// Provision game servers on freshly created VMs
#[derive(Parser)]
#[command(
    name = "gantry",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Config file
    #[arg(long, global = true, env = "GANTRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Owner and server store
    #[arg(long, global = true, env = "GANTRY_STORE")]
    pub store: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision a server and run its follow-up jobs
    Provision(commands::provision::ProvisionArgs),

    /// Show a server's provisioning state
    Status(commands::status::StatusArgs),

    /// Show the effective configuration
    Config,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the context cannot be built or the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            config,
            store,
            json,
            quiet,
            no_color,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            config,
            store,
        })?;

        match command {
            Command::Provision(args) => commands::provision::run(&app, &args).await,
            Command::Status(args) => commands::status::run(&app, &args).await,
            Command::Config => commands::config::run(&app),
        }
    }
}
