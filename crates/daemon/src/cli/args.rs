pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "strongbox")]
#[command(version)]
#[command(about = "Hand out secrets to registered services, encrypted end to end")]
pub struct Args {
    /// Path to the strongbox config directory (defaults to ~/.strongbox)
    #[arg(long, global = true, env = "STRONGBOX_CONFIG_PATH")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
