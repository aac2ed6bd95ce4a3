//! CLI for the QDM multi-connection downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use qdm_core::config;
use std::path::PathBuf;

use commands::{run_completions, run_get, run_probe, GetArgs};

/// Top-level CLI for QDM.
#[derive(Debug, Parser)]
#[command(name = "qdm")]
#[command(about = "QDM: multi-connection HTTP downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a URL, splitting it across connections when the server allows.
    ///
    /// The server is probed before the transfer; when --name is omitted an
    /// additional probe runs first to pick the file name.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,

        /// Directory to save into (default: config `download_dir`, else the current directory).
        #[arg(long, short = 'd', value_name = "DIR")]
        dir: Option<PathBuf>,

        /// File name to save as. Without it, qdm sends one extra request up
        /// front to read the server's suggested name, then falls back to the URL.
        #[arg(long, short = 'o', value_name = "NAME")]
        name: Option<String>,

        /// Maximum concurrent connections (default: config `connections`).
        #[arg(long, short = 'c', value_name = "N")]
        connections: Option<usize>,

        /// Print the final session snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Report content length and range/pause support without downloading.
    Probe {
        url: String,

        #[arg(long)]
        json: bool,
    },

    /// Print a shell completion script to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get {
                url,
                dir,
                name,
                connections,
                json,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_get(
                    &cfg,
                    GetArgs {
                        url,
                        dir,
                        name,
                        connections,
                        json,
                    },
                )
                .await?
            }
            CliCommand::Probe { url, json } => run_probe(&url, json).await?,
            CliCommand::Completions { shell } => run_completions(shell),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
