//! hass-run - run a command as a daemon and mirror its state into a HomeAssistant entity

mod daemonize;
mod kill;
mod logging;
mod run;
mod settings;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hass-run")]
#[command(
    about = "Execute commands as daemons and update a HomeAssistant entity with the result",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command
    Run {
        /// HomeAssistant host (e.g., https://hass.fr)
        #[arg(short = 'f', long)]
        host: Option<String>,

        /// Bearer token for HomeAssistant
        #[arg(short, long)]
        bearer: Option<String>,

        /// Stay in the foreground (debugging)
        #[arg(short, long)]
        nodaemon: bool,

        /// Entity id to update (e.g., shell.backup)
        entity: String,

        /// File the supervisor records its pid in
        identifier_file: PathBuf,

        /// Command to run, after `--`
        #[arg(last = true, required = true, num_args = 1..)]
        command: Vec<String>,
    },

    /// Kill a running command
    Kill {
        /// Entity id the command reports to
        entity: String,

        /// File the supervisor recorded its pid in
        identifier_file: PathBuf,
    },
}

/// Synchronous entry point: daemonization has to happen before the Tokio runtime starts
fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            host,
            bearer,
            nodaemon,
            entity,
            identifier_file,
            command,
        } => run::execute(run::RunArgs {
            overrides: settings::Overrides { host, bearer },
            daemon: !nodaemon,
            entity,
            identifier_file,
            command,
        }),

        Commands::Kill {
            entity,
            identifier_file,
        } => kill::execute(&entity, &identifier_file),
    }
}
