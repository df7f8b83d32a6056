mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{handle_command, Command, Session};
use config::Settings;
use fido_core::Role;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fido")]
#[command(about = "FIDO catalog metadata review", long_about = None)]
struct Cli {
    /// Project store file (overrides FIDO_STORE_PATH and config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Acting user name
    #[arg(long, global = true)]
    user: Option<String>,
    #[arg(long, global = true, default_value = "reviewer")]
    role: Role,
    #[command(subcommand)]
    command: Command,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The CLI runs inside the project directory - current_dir is truth
    let settings = Settings::new(std::env::current_dir()?);
    init_logging(&settings.log_level());

    let mut session = Session::open(settings, cli.store, cli.user, cli.role);
    handle_command(&mut session, cli.command)
}
