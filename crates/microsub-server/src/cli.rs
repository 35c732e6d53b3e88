//! Command-line entry point.

use super::*;

#[derive(Parser, Debug)]
#[command(name = "microsub-server", version, about = "Microsub ingestion engine")]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the HTTP bind port.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Increase log verbosity (info -> debug -> trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs as JSON instead of human-readable text.
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub mode: Option<CommandMode>,
}

#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommandMode {
    /// Run the HTTP server: scheduler, Microsub API, WebSub and webmention
    /// endpoints. The default when no subcommand is given.
    #[default]
    Serve,
}
