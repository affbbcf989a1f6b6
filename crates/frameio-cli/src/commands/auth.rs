use std::io::{self, Write};

use clap::{Args, Subcommand};
use frameio_client::DEFAULT_HOST;

use crate::config::{config_path, Config, Profile, TOKEN_ENV};
use crate::output::{kv, mask};

#[derive(Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    command: AuthCommand,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Store a developer token for the profile
    Login {
        /// Token to store; prompted for when omitted
        #[arg(long)]
        token: Option<String>,
        /// API host
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,
    },
    /// Forget the profile's token
    Logout,
    /// Show the profile's host and a masked token
    Show,
}

fn prompt_input(prompt: &str) -> anyhow::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

pub fn run(args: AuthArgs, profile: &str) -> anyhow::Result<()> {
    match args.command {
        AuthCommand::Login { token, host } => login(profile, token, host),
        AuthCommand::Logout => logout(profile),
        AuthCommand::Show => show(profile),
    }
}

fn login(profile: &str, token: Option<String>, host: String) -> anyhow::Result<()> {
    let token = match token {
        Some(token) => token,
        None => prompt_input("Developer token: ")?,
    };
    if token.is_empty() {
        anyhow::bail!("a token is required");
    }

    let mut config = Config::load();
    config.profiles.insert(
        profile.to_string(),
        Profile {
            host: host.trim_end_matches('/').to_string(),
            token,
        },
    );
    config.save()?;
    println!("Saved profile '{profile}' to {}", config_path()?.display());
    Ok(())
}

fn logout(profile: &str) -> anyhow::Result<()> {
    let mut config = Config::load();
    if config.profiles.remove(profile).is_none() {
        anyhow::bail!("profile '{}' not found", profile);
    }
    config.save()?;
    println!("Logged out profile '{profile}'");
    Ok(())
}

fn show(profile: &str) -> anyhow::Result<()> {
    let config = Config::load();
    let env_token = std::env::var(TOKEN_ENV).ok();
    let from_env = env_token.as_deref().is_some_and(|t| !t.is_empty());
    let entry = config
        .resolve(profile, env_token)
        .ok_or_else(|| anyhow::anyhow!("profile '{}' not found", profile))?;

    println!("{}", kv("profile", profile));
    println!("{}", kv("host", &entry.host));
    println!("{}", kv("token", &mask(&entry.token)));
    if from_env {
        println!("{}", kv("source", TOKEN_ENV));
    }
    Ok(())
}
