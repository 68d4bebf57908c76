use crate::settings::SettingsAction;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "moefm")]
#[command(author, version, about = "Moe FM UPnP media server")]
pub struct Cli {
    /// Configuration directory (default: $MOEFM_CONFIG, ./.moefm, ~/.moefm)
    #[arg(short, long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default)
    Serve,

    /// Read or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}
