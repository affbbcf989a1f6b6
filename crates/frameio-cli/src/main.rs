use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod output;

use commands::Commands;

#[derive(Parser)]
#[command(name = "fio", version, about = "Move assets to and from Frame.io")]
struct Cli {
    /// Credentials profile from ~/.frameio/config.toml
    #[arg(long, global = true, default_value = config::DEFAULT_PROFILE)]
    profile: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    cli.command.run(&cli.profile).await
}
