//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Chinese almanac engine: derived calendar fields on a refresh schedule.
#[derive(Parser, Debug)]
#[command(name = "almanac-server", version, about)]
pub struct Cli {
    /// Path to the TOML settings file. Overrides `ALMANAC_SETTINGS`.
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the refresh scheduler and HTTP server (default).
    Serve {
        /// Bind address. Overrides `ALMANAC_HOST`.
        #[arg(long)]
        host: Option<String>,
        /// Listen port. Overrides `ALMANAC_PORT`.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Refresh every field once, print the export as JSON and exit.
    Export {
        /// Only this scope. Without it, the first value per field name.
        #[arg(long)]
        scope: Option<String>,
    },
}
